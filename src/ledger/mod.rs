//! Ledger collaborator: block-event subscription, provider lookup, height and broadcast.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::LedgerError;
use crate::model::Address;

pub mod rpc;


pub use rpc::RpcLedger;

/// One event emitted by a block or transaction, attributes in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChainEvent {
    pub height: u64,
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl RawChainEvent {
    pub fn new(height: u64, kind: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            height,
            kind: kind.into(),
            attributes,
        }
    }

    /// First value for `key`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub owner: Address,
    pub host_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: String,
    pub code: u32,
    pub log: String,
}

pub type EventStream = BoxStream<'static, Result<RawChainEvent, LedgerError>>;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Streams events matching `topic` starting at `from_height` (0 = current tip).
    /// The stream ends after yielding an error.
    async fn subscribe(&self, topic: &str, from_height: u64) -> Result<EventStream, LedgerError>;

    async fn provider(&self, address: &Address) -> Result<Provider, LedgerError>;

    async fn latest_height(&self) -> Result<u64, LedgerError>;

    /// Broadcasts an already-signed transaction.
    async fn broadcast(&self, signed_tx: &[u8]) -> Result<TxReceipt, LedgerError>;
}
