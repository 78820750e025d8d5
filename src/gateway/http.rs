//! [`Gateway`] over the provider's HTTP API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{Method, Uri};
use serde::Deserialize;
use tracing::debug;

use super::{Gateway, SubmitRequest};
use crate::error::GatewayError;
use crate::http::{make_get_request, make_method_request, HyperClient, Response};
use crate::model::{LeaseId, ServiceStatus};

pub struct HttpGateway {
    client: HyperClient,
    timeout: Duration,
}

impl HttpGateway {
    pub fn new(client: HyperClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn uri(host_uri: &str, path: &str) -> Result<Uri, GatewayError> {
        let url = format!("{}{}", host_uri.trim_end_matches('/'), path);
        url.parse().map_err(|_| GatewayError::InvalidUri(url))
    }
}

fn check(resp: &Response) -> Result<(), GatewayError> {
    if resp.is_success() {
        Ok(())
    } else {
        Err(GatewayError::Status {
            status: resp.status,
            body: resp.text(),
        })
    }
}

/// The gateway accepts the manifest as JSON; archived manifests are YAML.
fn manifest_json(manifest: &[u8]) -> Result<Bytes, GatewayError> {
    let doc: serde_json::Value =
        serde_yaml::from_slice(manifest).map_err(|e| GatewayError::Encode(e.to_string()))?;
    serde_json::to_vec(&doc)
        .map(Bytes::from)
        .map_err(|e| GatewayError::Encode(e.to_string()))
}

#[derive(Deserialize)]
struct LeaseStatusBody {
    #[serde(default)]
    services: Option<BTreeMap<String, ServiceStatus>>,
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn submit_manifest(&self, host_uri: &str, req: &SubmitRequest) -> Result<(), GatewayError> {
        let uri = Self::uri(host_uri, &format!("/deployment/{}/manifest", req.deployment.dseq))?;
        let body = manifest_json(&req.manifest)?;
        debug!(
            component = "gateway",
            event = "submit",
            uri = %uri,
            bytes = body.len(),
            "sending manifest"
        );
        let resp = make_method_request(
            &self.client,
            Method::PUT,
            uri,
            vec![("content-type", "application/json")],
            Some(body),
            self.timeout,
        )
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
        check(&resp)
    }

    async fn lease_status(&self, host_uri: &str, lease: &LeaseId) -> Result<Vec<ServiceStatus>, GatewayError> {
        let order = &lease.order;
        let uri = Self::uri(
            host_uri,
            &format!(
                "/lease/{}/{}/{}/status",
                order.deployment.dseq, order.gseq, order.oseq
            ),
        )?;
        let resp = make_get_request(&self.client, uri, self.timeout)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        check(&resp)?;
        let body: LeaseStatusBody =
            serde_json::from_slice(&resp.body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(body
            .services
            .unwrap_or_default()
            .into_iter()
            .map(|(name, mut status)| {
                if status.name.is_empty() {
                    status.name = name;
                }
                status
            })
            .collect())
    }
}
