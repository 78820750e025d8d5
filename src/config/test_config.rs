use super::{ClosedPolicy, Config, Logs, Poller, Shutdown, Tracker};
use std::time::Duration;

/// Creates a new test configuration.
pub fn new_test_config() -> Config {
    let mut cfg = Config::new_default(
        "testnet-1",
        "http://127.0.0.1:26657",
        "akash1owner",
        Some("http://127.0.0.1:1317"),
    );
    cfg.deploy.env = super::TEST.to_string();
    cfg.deploy.logs = Some(Logs {
        level: Some("debug".to_string()),
    });
    cfg.deploy.poller = Some(Poller {
        interval: Some(Duration::from_millis(500)),
        timeout: Some(Duration::from_secs(90)),
        attempts: Some(2),
        delay: Some(Duration::from_millis(10)),
    });
    cfg.deploy.tracker = Some(Tracker {
        on_deployment_closed: Some(ClosedPolicy::Log),
    });
    cfg.deploy.shutdown = Some(Shutdown {
        timeout: Some(Duration::from_secs(1)),
    });
    cfg
}
