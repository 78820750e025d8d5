// Command wiring: builds the collaborators and runs the components under one coordinator.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::Archive;
use crate::bus::Bus;
use crate::chain::ChainSource;
use crate::config::{Config, ConfigTrait};
use crate::coordinator::Coordinator;
use crate::dedlog;
use crate::dispatch::ManifestDispatcher;
use crate::error::{Error, Result};
use crate::fswatch::FsSource;
use crate::gateway::{Gateway, HttpGateway};
use crate::handler::{drive, EventPrinter};
use crate::http::create_client;
use crate::ledger::{Ledger, RpcLedger};
use crate::model::{DeploymentData, DeploymentId, LeaseSnapshot};
use crate::poller::{AvailabilityPoller, PollOutcome};
use crate::shutdown;
use crate::tracker::DeploymentTracker;

const COMPONENT: &str = "app";

/// What `create` needs besides the config.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub sdl: PathBuf,
    /// Defaults to the latest block height. Required with `signed_tx`.
    pub dseq: Option<u64>,
    /// Pre-signed create-deployment transaction to broadcast.
    pub signed_tx: Option<Vec<u8>>,
}

pub struct App {
    cfg: Config,
    shutdown_token: CancellationToken,
    archive: Archive,
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn Gateway>,
    handle_signals: bool,
}

impl App {
    /// Builds the HTTP collaborators from `cfg`. SIGINT/SIGTERM cancel `shutdown_token`.
    pub fn new(shutdown_token: CancellationToken, cfg: Config, home: impl Into<PathBuf>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = create_client().context("build http client")?;
        let ledger = RpcLedger::new(
            client.clone(),
            &cfg.chain().rpc_addr,
            cfg.api_addr(),
            cfg.block_poll_interval(),
            cfg.gateway_timeout(),
        )
        .context("configure ledger client")?;
        let gateway = HttpGateway::new(client, cfg.gateway_timeout());

        let mut app = Self::with_collaborators(shutdown_token, cfg, home, Arc::new(ledger), Arc::new(gateway));
        app.handle_signals = true;
        Ok(app)
    }

    /// Same as [`App::new`] with injected collaborators and no signal handling.
    pub fn with_collaborators(
        shutdown_token: CancellationToken,
        cfg: Config,
        home: impl Into<PathBuf>,
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            cfg,
            shutdown_token,
            archive: Archive::new(home),
            ledger,
            gateway,
            handle_signals: false,
        }
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Prints every event for the configured owner until cancelled.
    pub async fn start(&self) -> Result<()> {
        let bus = Bus::new(self.cfg.bus_capacity());
        let mut coord = self.coordinator();
        self.spawn_printer(&mut coord, &bus)?;
        self.spawn_sources(&mut coord, &bus, 0);
        info!(component = COMPONENT, event = "started", owner = %self.cfg.owner(), "watching owner events");

        let res = coord.wait().await;
        bus.close();
        res
    }

    /// Tracks an existing deployment whose manifest is already archived.
    /// The chain is replayed from the deployment's creation block (its dseq), so orders
    /// opened before the watch started are known when their leases arrive.
    pub async fn watch(&self, dseq: u64) -> Result<PollOutcome> {
        let id = DeploymentId::new(self.cfg.owner(), dseq);
        let manifest = self.archive.load(&id).await?;
        self.track(id, manifest, dseq.max(1), None).await
    }

    /// Archives the SDL, optionally broadcasts the signed transaction, then tracks the deployment.
    pub async fn create(&self, req: CreateRequest) -> Result<PollOutcome> {
        // a signed tx already carries its dseq; guessing one would track the wrong deployment
        if req.signed_tx.is_some() && req.dseq.is_none() {
            return Err(Error::InvalidRequest(
                "a signed transaction needs the dseq it was built with".to_string(),
            ));
        }
        let manifest = tokio::fs::read(&req.sdl).await.map_err(|source| Error::Archive {
            path: req.sdl.clone(),
            source,
        })?;

        let height = self.ledger.latest_height().await?;
        let dseq = req.dseq.unwrap_or(height);
        let id = DeploymentId::new(self.cfg.owner(), dseq);

        let path = self.archive.store(&id, &manifest).await?;
        info!(
            component = COMPONENT,
            event = "archived",
            owner = %id.owner,
            dseq = id.dseq,
            path = %path.display(),
            "manifest archived"
        );

        // neither an earlier creation nor the broadcast tx can be missed from here
        let from_height = dseq.min(height).max(1);
        self.track(id, manifest, from_height, req.signed_tx).await
    }

    async fn track(
        &self,
        id: DeploymentId,
        manifest: Vec<u8>,
        from_height: u64,
        signed_tx: Option<Vec<u8>>,
    ) -> Result<PollOutcome> {
        let bus = Bus::new(self.cfg.bus_capacity());
        let mut coord = self.coordinator();
        let token = coord.token();

        self.spawn_printer(&mut coord, &bus)?;

        let (lease_tx, lease_rx) = mpsc::channel(self.cfg.bus_capacity());
        let (snapshot_tx, snapshot_rx) = watch::channel(LeaseSnapshot::default());

        let tracker = DeploymentTracker::new(
            DeploymentData::new(id.clone(), manifest),
            lease_tx,
            snapshot_tx,
            self.cfg.on_deployment_closed(),
            token.clone(),
        );
        coord.spawn("tracker", drive(tracker, bus.subscribe()?, token.clone()));

        let dispatcher = ManifestDispatcher::new(
            self.ledger.clone(),
            self.gateway.clone(),
            self.archive.clone(),
            self.cfg.dispatch_policy(),
        );
        coord.spawn("dispatcher", dispatcher.run(lease_rx, token.clone()));

        let (outcome_tx, mut outcome_rx) = oneshot::channel();
        let poller = AvailabilityPoller::new(
            self.ledger.clone(),
            self.gateway.clone(),
            snapshot_rx,
            self.cfg.poller(),
        );
        let poller_token = token.clone();
        coord.spawn("poller", async move {
            let outcome = poller.run(poller_token).await?;
            let _ = outcome_tx.send(outcome);
            Ok(())
        });

        self.spawn_sources(&mut coord, &bus, from_height);

        if let Some(tx) = signed_tx {
            let ledger = self.ledger.clone();
            coord.spawn("broadcast", async move {
                let receipt = ledger.broadcast(&tx).await?;
                info!(
                    component = COMPONENT,
                    event = "broadcast",
                    hash = %receipt.hash,
                    "create deployment transaction accepted"
                );
                Ok(())
            });
        }

        info!(
            component = COMPONENT,
            event = "tracking",
            owner = %id.owner,
            dseq = id.dseq,
            "tracking deployment"
        );

        let res = coord.wait().await;
        bus.close();
        res?;

        let outcome = outcome_rx.try_recv().unwrap_or(PollOutcome::Cancelled);
        match &outcome {
            PollOutcome::Ready { lease, services } => info!(
                component = COMPONENT,
                event = "available",
                provider = %lease.provider,
                services = services.len(),
                "deployment is available"
            ),
            PollOutcome::TimedOut => warn!(component = COMPONENT, event = "timed_out", "deployment did not become available"),
            PollOutcome::Cancelled => info!(component = COMPONENT, event = "cancelled", "tracking stopped"),
        }
        Ok(outcome)
    }

    fn coordinator(&self) -> Coordinator {
        let mut coord = Coordinator::new(self.shutdown_token.clone(), self.cfg.shutdown_timeout());
        let token = coord.token();

        let dedup_token = token.clone();
        coord.spawn("dedlog", async move {
            dedlog::start_dedup_logger(dedup_token, dedlog::FLUSH_PERIOD).await;
            Ok(())
        });
        if self.handle_signals {
            coord.spawn("signals", shutdown::listen(token));
        }
        coord
    }

    fn spawn_printer(&self, coord: &mut Coordinator, bus: &Bus) -> Result<()> {
        let printer = EventPrinter::new(self.cfg.owner());
        coord.spawn("printer", drive(printer, bus.subscribe()?, coord.token()));
        Ok(())
    }

    /// Sources go last so every consumer is subscribed before the first publish.
    fn spawn_sources(&self, coord: &mut Coordinator, bus: &Bus, from_height: u64) {
        let chain = ChainSource::new(self.ledger.clone(), self.cfg.topic(), self.cfg.reconnect_policy())
            .from_height(from_height);
        coord.spawn("chain", chain.publish(bus.clone(), coord.token()));

        let fs = FsSource::new(self.archive.home());
        coord.spawn("fswatch", fs.publish(bus.clone(), coord.token()));
    }
}

/// Writes a fresh config to `path`. Refuses to overwrite an existing file.
pub fn init_config(path: &Path, cfg: &Config) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("config {:?} already exists", path);
    }
    cfg.write(path)?;
    info!(component = "config", event = "written", path = ?path, "config written");
    Ok(())
}
