use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::{new_test_config, Config, Poller};
use crate::error::{Error, LedgerError};
use crate::model::{DeploymentId, LeaseId, OrderId};
use crate::poller::PollOutcome;
use crate::support::{lease_created, order_created, service, FakeGateway, FakeLedger};

const OWNER: &str = "akash1owner";
const PROVIDER: &str = "akash1provider";
const HOST: &str = "https://provider.example:8443";
const MANIFEST: &[u8] = b"version: \"2.0\"\nservices:\n  web:\n    image: nginx\n";
const RUN_LIMIT: Duration = Duration::from_secs(15);

fn lease(dseq: u64) -> LeaseId {
    LeaseId::new(OrderId::new(DeploymentId::new(OWNER, dseq), 1, 1), PROVIDER)
}

fn short_timeout(mut cfg: Config, timeout: Duration) -> Config {
    cfg.deploy.poller = Some(Poller {
        interval: Some(Duration::from_millis(100)),
        timeout: Some(timeout),
        attempts: Some(2),
        delay: Some(Duration::from_millis(10)),
    });
    cfg
}

struct Harness {
    _home: TempDir,
    app: App,
    ledger: Arc<FakeLedger>,
    gateway: Arc<FakeGateway>,
    token: CancellationToken,
}

async fn harness(cfg: Config, ledger: FakeLedger, gateway: FakeGateway) -> Harness {
    let home = TempDir::new().unwrap();
    let ledger = Arc::new(ledger);
    let gateway = Arc::new(gateway);
    let token = CancellationToken::new();
    let app = App::with_collaborators(token.clone(), cfg, home.path(), ledger.clone(), gateway.clone());
    app.archive()
        .store(&DeploymentId::new(OWNER, 7), MANIFEST)
        .await
        .unwrap();
    Harness {
        _home: home,
        app,
        ledger,
        gateway,
        token,
    }
}

#[tokio::test]
async fn test_lease_for_tracked_deployment_submits_archived_manifest() {
    let ledger = FakeLedger::default().with_provider(PROVIDER, HOST);
    ledger.push_script(vec![order_created(10, OWNER, 7), lease_created(11, OWNER, 7, PROVIDER)], true);
    let gateway = FakeGateway::default();
    gateway.set_status(&lease(7), vec![service("web", 1, 1)]);
    let h = harness(new_test_config(), ledger, gateway).await;

    let outcome = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap();

    match outcome {
        PollOutcome::Ready { lease: ready, services } => {
            assert_eq!(ready, lease(7));
            assert_eq!(services, vec![service("web", 1, 1)]);
        }
        other => panic!("expected ready, got {other:?}"),
    }
    let submissions = h.gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, HOST);
    assert_eq!(submissions[0].1.deployment, DeploymentId::new(OWNER, 7));
    assert_eq!(submissions[0].1.manifest, MANIFEST);
    assert!(h.token.is_cancelled(), "ready deployment ends the run");
}

#[tokio::test]
async fn test_watch_replays_from_creation_height_to_find_earlier_orders() {
    // the order was opened at the creation block, long before the watch started
    let ledger = FakeLedger::default().with_provider(PROVIDER, HOST);
    ledger.height.store(500, Ordering::SeqCst);
    ledger.push_script(vec![order_created(7, OWNER, 7), lease_created(11, OWNER, 7, PROVIDER)], true);
    let gateway = FakeGateway::default();
    gateway.set_status(&lease(7), vec![service("web", 1, 1)]);
    let h = harness(new_test_config(), ledger, gateway).await;

    let outcome = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap();

    assert!(matches!(outcome, PollOutcome::Ready { .. }));
    assert_eq!(h.ledger.subscribed_from.lock().first().copied(), Some(7));
    assert_eq!(h.gateway.submissions().len(), 1);
}

#[tokio::test]
async fn test_duplicate_lease_event_submits_once() {
    let ledger = FakeLedger::default().with_provider(PROVIDER, HOST);
    ledger.push_script(
        vec![
            order_created(10, OWNER, 7),
            lease_created(11, OWNER, 7, PROVIDER),
            lease_created(11, OWNER, 7, PROVIDER),
        ],
        true,
    );
    let gateway = FakeGateway::default();
    gateway.set_status(&lease(7), vec![service("web", 1, 1)]);
    let h = harness(new_test_config(), ledger, gateway).await;

    let outcome = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap();

    assert!(matches!(outcome, PollOutcome::Ready { .. }));
    assert_eq!(h.gateway.submissions().len(), 1);
}

#[tokio::test]
async fn test_events_of_other_deployments_never_trigger_work() {
    let ledger = FakeLedger::default().with_provider(PROVIDER, HOST);
    ledger.push_script(
        vec![
            order_created(10, OWNER, 8),
            lease_created(11, OWNER, 8, PROVIDER),
            order_created(12, "akash1stranger", 7),
            lease_created(13, "akash1stranger", 7, PROVIDER),
        ],
        true,
    );
    let cfg = short_timeout(new_test_config(), Duration::from_millis(800));
    let h = harness(cfg, ledger, FakeGateway::default()).await;

    let outcome = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap();

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert!(h.gateway.submissions().is_empty());
    assert_eq!(h.gateway.status_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.ledger.provider_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_provider_fails_the_run() {
    // no provider registered: the lookup fails permanently
    let ledger = FakeLedger::default();
    ledger.push_script(vec![order_created(10, OWNER, 7), lease_created(11, OWNER, 7, PROVIDER)], true);
    let h = harness(new_test_config(), ledger, FakeGateway::default()).await;

    let err = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap_err();

    match err {
        Error::ManifestDelivery { lease: failed, source } => {
            assert_eq!(failed, lease(7));
            assert!(matches!(*source, Error::Ledger(LedgerError::ProviderNotFound(_))));
        }
        other => panic!("expected delivery failure, got {other:?}"),
    }
    assert!(h.token.is_cancelled());
}

#[tokio::test]
async fn test_watch_without_archived_manifest_fails() {
    let h = harness(new_test_config(), FakeLedger::default(), FakeGateway::default()).await;

    let err = h.app.watch(99).await.unwrap_err();

    assert!(matches!(err, Error::Archive { .. }));
}

#[tokio::test]
async fn test_external_cancellation_stops_tracking() {
    let h = harness(new_test_config(), FakeLedger::default(), FakeGateway::default()).await;
    let token = h.token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let outcome = tokio::time::timeout(RUN_LIMIT, h.app.watch(7)).await.unwrap().unwrap();

    assert_eq!(outcome, PollOutcome::Cancelled);
}

#[tokio::test]
async fn test_start_runs_until_cancelled() {
    let ledger = FakeLedger::default();
    ledger.push_script(vec![order_created(10, OWNER, 7)], true);
    let h = harness(new_test_config(), ledger, FakeGateway::default()).await;
    let token = h.token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    tokio::time::timeout(RUN_LIMIT, h.app.start()).await.unwrap().unwrap();

    assert_eq!(h.ledger.subscribed_from.lock().first().copied(), Some(0));
}
