//! Runs every component as a task under one cancellation scope.
//!
//! The first real failure cancels the scope; once cancelled, tasks get
//! `shutdown_timeout` to exit before they are aborted.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};


const COMPONENT: &str = "coordinator";

pub struct Coordinator {
    tasks: JoinSet<(&'static str, Result<()>)>,
    token: CancellationToken,
    shutdown_timeout: Duration,
}

impl Coordinator {
    pub fn new(token: CancellationToken, shutdown_timeout: Duration) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
            shutdown_timeout,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, name: &'static str, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        debug!(component = COMPONENT, task = name, "starting task");
        self.tasks.spawn(async move {
            let res = AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(Error::TaskPanicked(name.to_string())));
            (name, res)
        });
    }

    /// Waits for every task. Returns the first error that was not caused by cancellation.
    pub async fn wait(mut self) -> Result<()> {
        let mut first: Option<Error> = None;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                joined = self.tasks.join_next() => match joined {
                    Some(joined) => self.record(joined, &mut first),
                    None => return first.map_or(Ok(()), Err),
                },
            }
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(joined)) => self.record(joined, &mut first),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        component = COMPONENT,
                        remaining = self.tasks.len(),
                        timeout = ?self.shutdown_timeout,
                        "tasks did not stop in time, aborting"
                    );
                    self.tasks.abort_all();
                    while self.tasks.join_next().await.is_some() {}
                    if first.is_none() {
                        first = Some(Error::ShutdownTimeout(self.shutdown_timeout));
                    }
                    break;
                }
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn record(
        &self,
        joined: std::result::Result<(&'static str, Result<()>), tokio::task::JoinError>,
        first: &mut Option<Error>,
    ) {
        match joined {
            Ok((name, Ok(()))) => debug!(component = COMPONENT, task = name, "task finished"),
            Ok((name, Err(e))) if e.is_cancellation() => {
                debug!(component = COMPONENT, task = name, "task cancelled")
            }
            Ok((name, Err(e))) => {
                error!(component = COMPONENT, task = name, error = %e, "task failed");
                if first.is_none() {
                    *first = Some(e);
                }
                self.token.cancel();
            }
            // only aborted tasks end up here; panics are caught in spawn
            Err(e) => debug!(component = COMPONENT, error = %e, "task aborted"),
        }
    }
}
