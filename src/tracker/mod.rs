//! Deployment state tracker: the single writer of [`DeploymentData`].

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClosedPolicy;
use crate::error::{Error, Result};
use crate::handler::EventHandler;
use crate::model::{DeploymentData, Event, LeaseId, LeaseSnapshot, Transition};


const COMPONENT: &str = "tracker";

pub struct DeploymentTracker {
    data: DeploymentData,
    leases: mpsc::Sender<LeaseId>,
    snapshot: watch::Sender<LeaseSnapshot>,
    on_closed: ClosedPolicy,
    token: CancellationToken,
}

impl DeploymentTracker {
    pub fn new(
        data: DeploymentData,
        leases: mpsc::Sender<LeaseId>,
        snapshot: watch::Sender<LeaseSnapshot>,
        on_closed: ClosedPolicy,
        token: CancellationToken,
    ) -> Self {
        Self {
            data,
            leases,
            snapshot,
            on_closed,
            token,
        }
    }

    pub fn data(&self) -> &DeploymentData {
        &self.data
    }

    async fn forward(&self, lease: LeaseId) -> Result<()> {
        tokio::select! {
            _ = self.token.cancelled() => Err(Error::Cancelled),
            sent = self.leases.send(lease) => sent.map_err(|_| Error::Cancelled),
        }
    }
}

#[async_trait]
impl EventHandler for DeploymentTracker {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    async fn handle(&mut self, event: Event) -> Result<()> {
        let transition = self.data.apply(&event);
        let dseq = self.data.id().dseq;
        match &transition {
            Transition::Ignored => return Ok(()),
            Transition::Observed => {
                debug!(component = COMPONENT, dseq, kind = event.kind(), "observed")
            }
            Transition::OrderOpened(order) => {
                info!(component = COMPONENT, dseq, gseq = order.gseq, oseq = order.oseq, "order opened")
            }
            Transition::OrderClosed(order) => {
                info!(component = COMPONENT, dseq, gseq = order.gseq, oseq = order.oseq, "order closed")
            }
            Transition::LeaseOpened(lease) => {
                info!(component = COMPONENT, dseq, provider = %lease.provider, "lease opened");
                self.forward(lease.clone()).await?;
            }
            Transition::LeaseClosed(lease) => {
                info!(component = COMPONENT, dseq, provider = %lease.provider, "lease closed")
            }
            Transition::LeaseOrphaned(lease) => warn!(
                component = COMPONENT,
                dseq,
                gseq = lease.order.gseq,
                oseq = lease.order.oseq,
                provider = %lease.provider,
                "lease for an order never seen, ignoring"
            ),
            Transition::DeploymentClosed => {
                warn!(component = COMPONENT, dseq, policy = ?self.on_closed, "tracked deployment closed");
                if self.on_closed == ClosedPolicy::Cancel {
                    self.token.cancel();
                }
            }
        }
        if transition.is_mutation() {
            self.snapshot.send_replace(self.data.snapshot());
        }
        Ok(())
    }
}
