//! Hyper HTTP client shared by the chain RPC and provider gateway clients.
//!
//! Both talk to a handful of hosts with low request rates, so the pool is small:
//! - Max idle connections per host: 8
//! - Max idle connection duration: 30s
//! - Connection timeout: 3s
//! - TCP keep-alive: 30s
//! - TCP_NODELAY: enabled

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::dns::GaiResolver;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Connection pool configuration constants.
pub const CONNS_PER_HOST: usize = 8;
pub const MAX_IDLE_CONN_DURATION: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

pub type HyperClient =
    Client<HttpsConnector<HttpConnector<GaiResolver>>, BoxBody<Bytes, hyper::Error>>;

/// Creates a client that speaks plain HTTP and HTTPS (native roots).
///
/// Provider gateways commonly serve self-signed certificates; hosts are reached as
/// configured and certificate failures surface as transport errors.
pub fn create_client() -> std::io::Result<HyperClient> {
    let mut http_connector = HttpConnector::new_with_resolver(GaiResolver::new());
    http_connector.set_nodelay(true);
    http_connector.set_keepalive(Some(TCP_KEEPALIVE));
    http_connector.set_connect_timeout(Some(CONNECT_TIMEOUT));
    http_connector.enforce_http(false);

    let tls = hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()?
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    Ok(Client::builder(TokioExecutor::new())
        .pool_idle_timeout(MAX_IDLE_CONN_DURATION)
        .pool_max_idle_per_host(CONNS_PER_HOST)
        .retry_canceled_requests(true)
        .build(tls))
}
