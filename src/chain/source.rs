//! Publishes translated ledger events, resubscribing after transient failures.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::translate::translate;
use crate::bus::Bus;
use crate::dedlog;
use crate::error::{Error, LedgerError, Result, Transient};
use crate::ledger::Ledger;
use crate::retry::{retry, RetryPolicy};

const COMPONENT: &str = "chain";

pub struct ChainSource {
    ledger: Arc<dyn Ledger>,
    topic: String,
    from_height: u64,
    reconnect: RetryPolicy,
}

impl ChainSource {
    pub fn new(ledger: Arc<dyn Ledger>, topic: impl Into<String>, reconnect: RetryPolicy) -> Self {
        Self {
            ledger,
            topic: topic.into(),
            from_height: 0,
            reconnect,
        }
    }

    /// First height to read; 0 starts at the current tip.
    pub fn from_height(mut self, height: u64) -> Self {
        self.from_height = height;
        self
    }

    /// Runs until cancelled or a terminal error.
    pub async fn publish(self, bus: Bus, token: CancellationToken) -> Result<()> {
        let mut from = self.from_height;
        let mut failures = 0u32;

        loop {
            let ledger = self.ledger.clone();
            let topic = self.topic.clone();
            let mut stream = retry(&self.reconnect, &token, "chain subscribe", || {
                let ledger = ledger.clone();
                let topic = topic.clone();
                async move { ledger.subscribe(&topic, from).await }
            })
            .await
            .map_err(|e| e.into_error("chain subscribe"))?;
            info!(component = COMPONENT, event = "subscribed", topic = %self.topic, from, "listening for chain events");

            let cause = loop {
                let item = tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    item = stream.next() => item,
                };
                let raw = match item {
                    Some(Ok(raw)) => raw,
                    Some(Err(e)) => break e,
                    None => break LedgerError::StreamEnded,
                };
                failures = 0;
                from = raw.height + 1;

                match translate(&raw) {
                    Ok(Some(event)) => {
                        debug!(component = COMPONENT, event = "received", kind = event.kind(), height = raw.height);
                        tokio::select! {
                            _ = token.cancelled() => return Ok(()),
                            res = bus.publish(event) => { res?; }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => dedlog::warn(COMPONENT, "dropped malformed chain event", &format!("height={} {}", raw.height, e)),
                }
            };

            if !cause.is_transient() {
                return Err(Error::Ledger(cause));
            }
            failures += 1;
            if failures >= self.reconnect.attempts {
                return Err(Error::RetriesExhausted {
                    what: "chain stream".to_string(),
                    attempts: failures,
                    source: Box::new(Error::Ledger(cause)),
                });
            }
            let wait = self.reconnect.backoff(failures);
            warn!(component = COMPONENT, event = "resubscribe", error = %cause, from, attempt = failures, "chain stream interrupted");
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}
