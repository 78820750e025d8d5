//! Provider gateway collaborator: manifest submission and lease status.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::model::{DeploymentId, LeaseId, ServiceStatus};

pub mod http;


pub use http::HttpGateway;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub deployment: DeploymentId,
    pub manifest: Vec<u8>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn submit_manifest(&self, host_uri: &str, req: &SubmitRequest) -> Result<(), GatewayError>;

    async fn lease_status(&self, host_uri: &str, lease: &LeaseId) -> Result<Vec<ServiceStatus>, GatewayError>;
}
