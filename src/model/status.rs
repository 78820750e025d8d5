//! Service availability reported by a provider for one lease.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub uris: Vec<String>,
}

impl ServiceStatus {
    /// Every replica is up. A service reporting no replicas is not ready.
    pub fn is_ready(&self) -> bool {
        self.total > 0 && self.available == self.total
    }
}

/// True when the provider listed at least one service and every one of them is fully available.
pub fn all_ready(services: &[ServiceStatus]) -> bool {
    !services.is_empty() && services.iter().all(ServiceStatus::is_ready)
}
