//! Availability poller: waits for the leased services to come up, then ends the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PollerSettings;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::ledger::Ledger;
use crate::model::{all_ready, Address, LeaseId, LeaseSnapshot, ServiceStatus};
use crate::retry::retry;


const COMPONENT: &str = "poller";

/// How a polling run ended. Every variant is a clean stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready {
        lease: LeaseId,
        services: Vec<ServiceStatus>,
    },
    TimedOut,
    Cancelled,
}

pub struct AvailabilityPoller {
    ledger: Arc<dyn Ledger>,
    gateway: Arc<dyn Gateway>,
    snapshot: watch::Receiver<LeaseSnapshot>,
    settings: PollerSettings,
    hosts: HashMap<Address, String>,
}

impl AvailabilityPoller {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        gateway: Arc<dyn Gateway>,
        snapshot: watch::Receiver<LeaseSnapshot>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            ledger,
            gateway,
            snapshot,
            settings,
            hosts: HashMap::new(),
        }
    }

    /// Polls every interval until a lease is fully available or the timeout passes.
    /// Both cancel `token`; only exhausted query retries are errors.
    /// A poll still in flight at the deadline is abandoned.
    pub async fn run(mut self, token: CancellationToken) -> Result<PollOutcome> {
        let timeout = self.settings.timeout;
        let deadline = tokio::time::sleep_until(Instant::now() + timeout);
        tokio::pin!(deadline);
        let mut tick = tokio::time::interval(self.settings.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first poll waits one period
        tick.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = &mut deadline => return Ok(timed_out(&token, timeout)),
                _ = tick.tick() => {}
            }

            let snapshot = self.snapshot.borrow().clone();
            if !snapshot.expected {
                continue;
            }
            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = &mut deadline => return Ok(timed_out(&token, timeout)),
                polled = self.poll(&snapshot.leases, &token) => polled,
            };
            match polled {
                Ok(Some(outcome)) => {
                    token.cancel();
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(Error::Cancelled) => return Ok(PollOutcome::Cancelled),
                Err(e) => return Err(e),
            }
        }
    }

    async fn poll(&mut self, leases: &[LeaseId], token: &CancellationToken) -> Result<Option<PollOutcome>> {
        for lease in leases {
            let host = self.host_uri(&lease.provider, token).await?;
            let gateway = self.gateway.clone();
            let services = retry(&self.settings.retry, token, "lease status", || {
                gateway.lease_status(&host, lease)
            })
            .await
            .map_err(|e| e.into_error("lease status"))?;

            if all_ready(&services) {
                for s in &services {
                    info!(
                        component = COMPONENT,
                        name = %s.name,
                        available = s.available,
                        uris = %s.uris.join(","),
                        "service available"
                    );
                }
                return Ok(Some(PollOutcome::Ready {
                    lease: lease.clone(),
                    services,
                }));
            }
            debug!(
                component = COMPONENT,
                provider = %lease.provider,
                ready = services.iter().filter(|s| s.is_ready()).count(),
                total = services.len(),
                "services not ready yet"
            );
        }
        Ok(None)
    }

    async fn host_uri(&mut self, provider: &Address, token: &CancellationToken) -> Result<String> {
        if let Some(host) = self.hosts.get(provider) {
            return Ok(host.clone());
        }
        let ledger = self.ledger.clone();
        let p = retry(&self.settings.retry, token, "provider query", || ledger.provider(provider))
            .await
            .map_err(|e| e.into_error("provider query"))?;
        self.hosts.insert(provider.clone(), p.host_uri.clone());
        Ok(p.host_uri)
    }
}

fn timed_out(token: &CancellationToken, timeout: Duration) -> PollOutcome {
    info!(
        component = COMPONENT,
        timeout = %humantime::format_duration(timeout),
        "timed out listening for deployment to be available"
    );
    token.cancel();
    PollOutcome::TimedOut
}
