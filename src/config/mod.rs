// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::bus::DEFAULT_CAPACITY;
use crate::model::Address;
use crate::retry::RetryPolicy;


pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
#[allow(dead_code)]
pub const TEST: &str = "test";

/// Default event query: committed transactions only.
pub const DEFAULT_TOPIC: &str = "tm.event='Tx'";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Deploy {
    #[serde(rename = "deploy")]
    pub deploy: DeployBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeployBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub chain: Chain,
    pub bus: Option<BusCfg>,
    pub dispatch: Option<Retry>,
    pub poller: Option<Poller>,
    pub tracker: Option<Tracker>,
    pub gateway: Option<Gateway>,
    pub shutdown: Option<Shutdown>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chain {
    pub chain_id: String,
    pub rpc_addr: String,
    /// REST endpoint for provider queries; falls back to `rpc_addr`.
    pub api_addr: Option<String>,
    pub owner: String,
    pub topic: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub block_poll_interval: Option<Duration>,
    pub reconnect: Option<Retry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BusCfg {
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Retry {
    pub attempts: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub delay: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub max_delay: Option<Duration>,
}

impl Retry {
    fn policy(&self, fallback: RetryPolicy) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts.unwrap_or(fallback.attempts),
            self.delay.unwrap_or(fallback.delay),
            self.max_delay.unwrap_or(fallback.max_delay),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Poller {
    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub attempts: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub delay: Option<Duration>,
}

/// What the tracker does when the tracked deployment is closed on chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosedPolicy {
    #[default]
    Log,    // warn and keep running
    Cancel, // warn and stop every task
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tracker {
    pub on_deployment_closed: Option<ClosedPolicy>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Gateway {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Resolved poller settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

pub const DEFAULT_BLOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn default_dispatch_policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_millis(500), Duration::from_secs(8))
}

fn default_reconnect_policy() -> RetryPolicy {
    RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(30))
}

fn default_poll_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(200), Duration::from_secs(1))
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn chain(&self) -> &Chain;
    fn owner(&self) -> Address;
    fn api_addr(&self) -> &str;
    fn topic(&self) -> &str;
    fn block_poll_interval(&self) -> Duration;
    fn reconnect_policy(&self) -> RetryPolicy;
    fn bus_capacity(&self) -> usize;
    fn dispatch_policy(&self) -> RetryPolicy;
    fn poller(&self) -> PollerSettings;
    fn on_deployment_closed(&self) -> ClosedPolicy;
    fn gateway_timeout(&self) -> Duration;
    fn shutdown_timeout(&self) -> Duration;
}

// Config type alias for convenience
pub type Config = Deploy;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.deploy.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.deploy.env == PROD
    }

    fn is_test(&self) -> bool {
        self.deploy.env == TEST
    }

    fn chain(&self) -> &Chain {
        &self.deploy.chain
    }

    fn owner(&self) -> Address {
        Address::new(self.deploy.chain.owner.clone())
    }

    fn api_addr(&self) -> &str {
        self.deploy
            .chain
            .api_addr
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.deploy.chain.rpc_addr)
    }

    fn topic(&self) -> &str {
        self.deploy.chain.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }

    fn block_poll_interval(&self) -> Duration {
        self.deploy
            .chain
            .block_poll_interval
            .unwrap_or(DEFAULT_BLOCK_POLL_INTERVAL)
    }

    fn reconnect_policy(&self) -> RetryPolicy {
        self.deploy
            .chain
            .reconnect
            .as_ref()
            .map(|r| r.policy(default_reconnect_policy()))
            .unwrap_or_else(default_reconnect_policy)
    }

    fn bus_capacity(&self) -> usize {
        self.deploy
            .bus
            .as_ref()
            .and_then(|b| b.capacity)
            .unwrap_or(DEFAULT_CAPACITY)
    }

    fn dispatch_policy(&self) -> RetryPolicy {
        self.deploy
            .dispatch
            .as_ref()
            .map(|r| r.policy(default_dispatch_policy()))
            .unwrap_or_else(default_dispatch_policy)
    }

    fn poller(&self) -> PollerSettings {
        let p = self.deploy.poller.as_ref();
        let fallback = default_poll_policy();
        PollerSettings {
            interval: p.and_then(|p| p.interval).unwrap_or(DEFAULT_POLL_INTERVAL),
            timeout: p.and_then(|p| p.timeout).unwrap_or(DEFAULT_POLL_TIMEOUT),
            retry: RetryPolicy::new(
                p.and_then(|p| p.attempts).unwrap_or(fallback.attempts),
                p.and_then(|p| p.delay).unwrap_or(fallback.delay),
                fallback.max_delay,
            ),
        }
    }

    fn on_deployment_closed(&self) -> ClosedPolicy {
        self.deploy
            .tracker
            .as_ref()
            .and_then(|t| t.on_deployment_closed)
            .unwrap_or_default()
    }

    fn gateway_timeout(&self) -> Duration {
        self.deploy
            .gateway
            .as_ref()
            .and_then(|g| g.timeout)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT)
    }

    fn shutdown_timeout(&self) -> Duration {
        self.deploy
            .shutdown
            .as_ref()
            .and_then(|s| s.timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}

impl Config {
    /// A config with every section spelled out, as written by `init`.
    pub fn new_default(chain_id: &str, rpc_addr: &str, owner: &str, api_addr: Option<&str>) -> Self {
        let dispatch = default_dispatch_policy();
        let reconnect = default_reconnect_policy();
        let poll = default_poll_policy();
        Self {
            deploy: DeployBox {
                env: DEV.to_string(),
                logs: Some(Logs {
                    level: Some("info".to_string()),
                }),
                chain: Chain {
                    chain_id: chain_id.to_string(),
                    rpc_addr: rpc_addr.to_string(),
                    api_addr: api_addr.map(str::to_string),
                    owner: owner.to_string(),
                    topic: Some(DEFAULT_TOPIC.to_string()),
                    block_poll_interval: Some(DEFAULT_BLOCK_POLL_INTERVAL),
                    reconnect: Some(Retry {
                        attempts: Some(reconnect.attempts),
                        delay: Some(reconnect.delay),
                        max_delay: Some(reconnect.max_delay),
                    }),
                },
                bus: Some(BusCfg {
                    capacity: Some(DEFAULT_CAPACITY),
                }),
                dispatch: Some(Retry {
                    attempts: Some(dispatch.attempts),
                    delay: Some(dispatch.delay),
                    max_delay: Some(dispatch.max_delay),
                }),
                poller: Some(Poller {
                    interval: Some(DEFAULT_POLL_INTERVAL),
                    timeout: Some(DEFAULT_POLL_TIMEOUT),
                    attempts: Some(poll.attempts),
                    delay: Some(poll.delay),
                }),
                tracker: Some(Tracker {
                    on_deployment_closed: Some(ClosedPolicy::Log),
                }),
                gateway: Some(Gateway {
                    timeout: Some(DEFAULT_GATEWAY_TIMEOUT),
                }),
                shutdown: Some(Shutdown {
                    timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
                }),
            },
        }
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let cfg: Deploy = serde_yaml::from_str(data).context("unmarshal config yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("load config {:?}", abs_path))
    }

    /// Writes the config as YAML, creating parent directories.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {:?}", parent))?;
        }
        let data = serde_yaml::to_string(self).context("marshal config yaml")?;
        std::fs::write(path, data).with_context(|| format!("write config file {:?}", path))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let chain = &self.deploy.chain;
        if chain.chain_id.trim().is_empty() {
            anyhow::bail!("chain.chain_id is required");
        }
        if chain.rpc_addr.trim().is_empty() {
            anyhow::bail!("chain.rpc_addr is required");
        }
        if chain.owner.trim().is_empty() {
            anyhow::bail!("chain.owner is required");
        }
        if self.bus_capacity() == 0 {
            anyhow::bail!("bus.capacity must be positive");
        }
        if self.block_poll_interval().is_zero() {
            anyhow::bail!("chain.block_poll_interval must be positive");
        }
        if self.poller().interval.is_zero() {
            anyhow::bail!("poller.interval must be positive");
        }
        Ok(())
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
