#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::archive::Archive;
    use crate::dispatch::ManifestDispatcher;
    use crate::error::{Error, GatewayError, LedgerError};
    use crate::model::{DeploymentId, LeaseId, OrderId};
    use crate::retry::RetryPolicy;
    use crate::support::{FakeGateway, FakeLedger};

    const MANIFEST: &[u8] = b"version: \"2.0\"\nservices:\n  web:\n    image: nginx\n";

    struct Setup {
        _home: tempfile::TempDir,
        ledger: Arc<FakeLedger>,
        gateway: Arc<FakeGateway>,
        dispatcher: ManifestDispatcher,
    }

    async fn setup(archived: bool) -> Setup {
        let home = tempfile::tempdir().unwrap();
        let archive = Archive::new(home.path());
        if archived {
            archive
                .store(&DeploymentId::new("akash1owner", 7), MANIFEST)
                .await
                .unwrap();
        }
        let ledger = Arc::new(
            FakeLedger::default().with_provider("akash1provider", "https://provider.example:8443"),
        );
        let gateway = Arc::new(FakeGateway::default());
        let dispatcher = ManifestDispatcher::new(
            ledger.clone(),
            gateway.clone(),
            archive,
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(40)),
        );
        Setup {
            _home: home,
            ledger,
            gateway,
            dispatcher,
        }
    }

    fn lease(provider: &str) -> LeaseId {
        LeaseId::new(OrderId::new(DeploymentId::new("akash1owner", 7), 1, 1), provider)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_lease_submits_once() {
        let mut s = setup(true).await;
        let token = CancellationToken::new();
        let l = lease("akash1provider");

        assert!(s.dispatcher.dispatch(&l, &token).await.unwrap());
        assert!(!s.dispatcher.dispatch(&l, &token).await.unwrap());

        let subs = s.gateway.submissions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].0, "https://provider.example:8443");
        assert_eq!(subs[0].1.deployment, DeploymentId::new("akash1owner", 7));
        assert_eq!(subs[0].1.manifest, MANIFEST);
        assert!(s.dispatcher.dispatched().contains(&l));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let mut s = setup(true).await;
        s.ledger.provider_failures.store(2, Ordering::SeqCst);
        s.gateway.submit_failures.store(2, Ordering::SeqCst);

        assert!(s
            .dispatcher
            .dispatch(&lease("akash1provider"), &CancellationToken::new())
            .await
            .unwrap());
        assert_eq!(s.ledger.provider_calls.load(Ordering::SeqCst), 3);
        assert_eq!(s.gateway.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_terminal() {
        let mut s = setup(true).await;
        s.gateway.submit_failures.store(10, Ordering::SeqCst);
        let l = lease("akash1provider");

        let err = s
            .dispatcher
            .dispatch(&l, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::ManifestDelivery { lease, source } => {
                assert_eq!(lease, l);
                assert!(matches!(*source, Error::RetriesExhausted { attempts: 3, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!s.dispatcher.dispatched().contains(&l));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_gateway_error_is_not_retried() {
        let mut s = setup(true).await;
        *s.gateway.submit_permanent.lock() = Some(GatewayError::Status {
            status: 400,
            body: "invalid manifest".into(),
        });
        let err = s
            .dispatcher
            .dispatch(&lease("akash1provider"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ManifestDelivery { ref source, .. }
                if matches!(**source, Error::Gateway(GatewayError::Status { status: 400, .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_provider_is_terminal() {
        let mut s = setup(true).await;
        let err = s
            .dispatcher
            .dispatch(&lease("akash1nobody"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ManifestDelivery { ref source, .. }
                if matches!(**source, Error::Ledger(LedgerError::ProviderNotFound(_)))
        ));
        assert_eq!(s.ledger.provider_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_archive_is_terminal() {
        let mut s = setup(false).await;
        let err = s
            .dispatcher
            .dispatch(&lease("akash1provider"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ManifestDelivery { ref source, .. } if matches!(**source, Error::Archive { .. })
        ));
        assert!(s.gateway.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_retry_is_not_a_delivery_error() {
        let mut s = setup(true).await;
        s.gateway.submit_failures.store(10, Ordering::SeqCst);
        let token = CancellationToken::new();
        token.cancel();
        let err = s
            .dispatcher
            .dispatch(&lease("akash1provider"), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_channel_until_closed() {
        let s = setup(true).await;
        let gateway = s.gateway.clone();
        let (tx, rx) = mpsc::channel(4);
        tx.send(lease("akash1provider")).await.unwrap();
        tx.send(lease("akash1provider")).await.unwrap();
        drop(tx);

        s.dispatcher.run(rx, CancellationToken::new()).await.unwrap();
        assert_eq!(gateway.submissions().len(), 1);
    }
}
