//! Bus consumers and the loop that drives them.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::Subscription;
use crate::error::Result;
use crate::model::Event;

pub mod printer;


pub use printer::EventPrinter;

/// Consumes bus events one at a time. An error ends the consumer's task.
#[async_trait]
pub trait EventHandler: Send {
    fn name(&self) -> &'static str;

    async fn handle(&mut self, event: Event) -> Result<()>;
}

/// Feeds `sub` into `handler` until the bus closes, `token` fires or the handler fails.
pub async fn drive<H: EventHandler>(mut handler: H, mut sub: Subscription, token: CancellationToken) -> Result<()> {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            event = sub.recv() => event,
        };
        let Some(event) = event else {
            debug!(component = handler.name(), event = "bus_closed", "subscription ended");
            return Ok(());
        };
        handler.handle(event).await?;
    }
}
