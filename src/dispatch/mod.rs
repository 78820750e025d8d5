//! Manifest dispatcher: delivers the archived manifest once per lease.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, SubmitRequest};
use crate::ledger::Ledger;
use crate::model::LeaseId;
use crate::retry::{retry, RetryPolicy};

#[cfg(test)]
mod dispatch_test;

const COMPONENT: &str = "dispatcher";

pub struct ManifestDispatcher {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn Gateway>,
    archive: Archive,
    policy: RetryPolicy,
    dispatched: HashSet<LeaseId>,
}

impl ManifestDispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn Gateway>,
        archive: Archive,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            gateway,
            archive,
            policy,
            dispatched: HashSet::new(),
        }
    }

    pub fn dispatched(&self) -> &HashSet<LeaseId> {
        &self.dispatched
    }

    /// Dispatches every lease received until the channel closes or `token` fires.
    pub async fn run(mut self, mut leases: mpsc::Receiver<LeaseId>, token: CancellationToken) -> Result<()> {
        loop {
            let lease = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                lease = leases.recv() => lease,
            };
            let Some(lease) = lease else {
                return Ok(());
            };
            self.dispatch(&lease, &token).await?;
        }
    }

    /// Delivers the manifest for `lease`. Returns false when it was already delivered.
    pub async fn dispatch(&mut self, lease: &LeaseId, token: &CancellationToken) -> Result<bool> {
        if self.dispatched.contains(lease) {
            debug!(component = COMPONENT, provider = %lease.provider, dseq = lease.order.deployment.dseq, "manifest already sent");
            return Ok(false);
        }
        self.deliver(lease, token).await.map_err(|e| match e {
            Error::Cancelled => Error::Cancelled,
            other => Error::ManifestDelivery {
                lease: lease.clone(),
                source: Box::new(other),
            },
        })?;
        self.dispatched.insert(lease.clone());
        Ok(true)
    }

    async fn deliver(&self, lease: &LeaseId, token: &CancellationToken) -> Result<()> {
        let provider = retry(&self.policy, token, "provider query", || {
            self.ledger.provider(&lease.provider)
        })
        .await
        .map_err(|e| e.into_error("provider query"))?;

        let deployment = lease.deployment().clone();
        let manifest = self.archive.load(&deployment).await?;
        let req = SubmitRequest {
            deployment,
            manifest,
        };

        info!(
            component = COMPONENT,
            provider = %lease.provider,
            uri = %provider.host_uri,
            dseq = req.deployment.dseq,
            "sending manifest to provider"
        );
        retry(&self.policy, token, "manifest submit", || {
            self.gateway.submit_manifest(&provider.host_uri, &req)
        })
        .await
        .map_err(|e| e.into_error("manifest submit"))?;

        info!(component = COMPONENT, provider = %lease.provider, dseq = req.deployment.dseq, "manifest accepted");
        Ok(())
    }
}
