//! Logs every event that belongs to the configured owner.

use async_trait::async_trait;
use tracing::{debug, info};

use super::EventHandler;
use crate::error::{Error, Result};
use crate::model::{Address, Event, FsClass, FsEvent};

const COMPONENT: &str = "printer";

pub struct EventPrinter {
    owner: Address,
}

impl EventPrinter {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    fn print_fs(&self, ev: &FsEvent) {
        let file = ev.file_name();
        match ev.class {
            FsClass::DeploymentFile => {
                info!(component = COMPONENT, file = %file, op = %ev.op, "deployment file")
            }
            FsClass::ConfigFile => {
                info!(component = COMPONENT, file = %file, op = %ev.op, "config dir file")
            }
            FsClass::Unexpected => {
                info!(component = COMPONENT, file = %file, op = %ev.op, "unexpected event")
            }
        }
    }
}

#[async_trait]
impl EventHandler for EventPrinter {
    fn name(&self) -> &'static str {
        COMPONENT
    }

    async fn handle(&mut self, event: Event) -> Result<()> {
        if let Some(dep) = event.deployment() {
            if dep.owner != self.owner {
                debug!(component = COMPONENT, owner = %dep.owner, kind = event.kind(), "foreign event");
                return Ok(());
            }
        }
        let owner = self.owner.as_str();
        match &event {
            Event::DeploymentCreated { id } => info!(component = COMPONENT, owner, dseq = id.dseq, "deployment created"),
            Event::DeploymentUpdated { id } => info!(component = COMPONENT, owner, dseq = id.dseq, "deployment updated"),
            Event::DeploymentClosed { id } => info!(component = COMPONENT, owner, dseq = id.dseq, "deployment closed"),
            Event::GroupClosed { id } => {
                info!(component = COMPONENT, owner, dseq = id.deployment.dseq, gseq = id.gseq, "deployment group closed")
            }
            Event::OrderCreated { id } => {
                info!(component = COMPONENT, owner, dseq = id.deployment.dseq, oseq = id.oseq, "order for deployment created")
            }
            Event::OrderClosed { id } => {
                info!(component = COMPONENT, owner, dseq = id.deployment.dseq, oseq = id.oseq, "order for deployment closed")
            }
            Event::BidCreated { id, price } => info!(
                component = COMPONENT,
                owner,
                dseq = id.order.deployment.dseq,
                oseq = id.order.oseq,
                provider = %id.provider,
                price = %price,
                "bid for order created"
            ),
            Event::BidClosed { id, price } => info!(
                component = COMPONENT,
                owner,
                dseq = id.order.deployment.dseq,
                oseq = id.order.oseq,
                provider = %id.provider,
                price = %price,
                "bid for order closed"
            ),
            Event::LeaseCreated { id, price } => info!(
                component = COMPONENT,
                owner,
                dseq = id.order.deployment.dseq,
                oseq = id.order.oseq,
                provider = %id.provider,
                price = %price,
                "lease for order created"
            ),
            Event::LeaseClosed { id, price } => info!(
                component = COMPONENT,
                owner,
                dseq = id.order.deployment.dseq,
                oseq = id.order.oseq,
                provider = %id.provider,
                price = %price,
                "lease for order closed"
            ),
            Event::Filesystem(ev) => self.print_fs(ev),
            Event::Error { cause } => return Err(Error::Source(cause.clone())),
        }
        Ok(())
    }
}
