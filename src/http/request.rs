//! Request helpers over [`HyperClient`] with a per-call timeout.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::{Method, Request, Uri};
use std::time::Duration;
use tokio::time::timeout;

use super::HyperClient;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("build request for {uri}: {reason}")]
    Build { uri: String, reason: String },
    #[error("request {uri}: {reason}")]
    Transport { uri: String, reason: String },
    #[error("request {uri} timed out after {timeout:?}")]
    Timeout { uri: String, timeout: Duration },
}

/// Status and fully-read body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn make_get_request(
    client: &HyperClient,
    uri: Uri,
    timeout_duration: Duration,
) -> Result<Response, RequestError> {
    make_method_request(client, Method::GET, uri, Vec::new(), None, timeout_duration).await
}

pub async fn make_method_request(
    client: &HyperClient,
    method: Method,
    uri: Uri,
    headers: Vec<(&str, &str)>,
    body: Option<Bytes>,
    timeout_duration: Duration,
) -> Result<Response, RequestError> {
    let uri_str = uri.to_string();

    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }

    let req_body: BoxBody<Bytes, hyper::Error> = if let Some(body_bytes) = body {
        Full::new(body_bytes)
            .map_err(|never: std::convert::Infallible| match never {})
            .boxed()
    } else {
        Empty::<Bytes>::new()
            .map_err(|never: std::convert::Infallible| match never {})
            .boxed()
    };

    let req = builder.body(req_body).map_err(|e| RequestError::Build {
        uri: uri_str.clone(),
        reason: e.to_string(),
    })?;

    let exchange = async {
        let response = client
            .request(req)
            .await
            .map_err(|e| RequestError::Transport {
                uri: uri_str.clone(),
                reason: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RequestError::Transport {
                uri: uri_str.clone(),
                reason: e.to_string(),
            })?
            .to_bytes();
        Ok(Response { status, body })
    };

    let outcome = timeout(timeout_duration, exchange).await;
    match outcome {
        Ok(res) => {
            if let Err(ref e) = res {
                tracing::debug!(uri = %uri_str, error = %e, "http request failed");
            }
            res
        }
        Err(_) => {
            tracing::warn!(uri = %uri_str, timeout = ?timeout_duration, "request timed out");
            Err(RequestError::Timeout {
                uri: uri_str,
                timeout: timeout_duration,
            })
        }
    }
}
