// Local axum servers standing in for the chain RPC node and provider gateways.

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running mock server; aborted on drop.
pub struct MockServer {
    pub addr: String,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("[mock] serve failed: {}", e);
            }
        });
        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
