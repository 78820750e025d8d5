//! Error taxonomy shared by every task under the coordinator.

use std::path::PathBuf;

use crate::model::{DeploymentId, LeaseId};

/// Tells the retry helper whether another attempt can help.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("bus is closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger transport: {0}")]
    Transport(String),
    #[error("ledger returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode ledger response: {0}")]
    Decode(String),
    #[error("provider {0} not found")]
    ProviderNotFound(String),
    #[error("transaction rejected with code {code}: {log}")]
    TxRejected { code: u32, log: String },
    #[error("event stream ended")]
    StreamEnded,
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        match self {
            LedgerError::Transport(_) | LedgerError::StreamEnded => true,
            LedgerError::Status { status, .. } => *status >= 500 || *status == 429,
            LedgerError::Rpc { .. }
            | LedgerError::Decode(_)
            | LedgerError::ProviderNotFound(_)
            | LedgerError::TxRejected { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport: {0}")]
    Transport(String),
    #[error("gateway returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid host uri {0}")]
    InvalidUri(String),
    #[error("encode manifest: {0}")]
    Encode(String),
    #[error("decode lease status: {0}")]
    Decode(String),
}

impl Transient for GatewayError {
    fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::Status { status, .. } => {
                *status >= 500 || *status == 404 || *status == 429
            }
            GatewayError::InvalidUri(_) | GatewayError::Encode(_) | GatewayError::Decode(_) => {
                false
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Task stopped because the shared scope was cancelled.
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("filesystem watcher: {0}")]
    Watcher(String),
    /// An `Error` event observed on the bus.
    #[error("source error: {0}")]
    Source(String),
    #[error("{what} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        what: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
    #[error("deliver manifest for lease {lease}: {source}")]
    ManifestDelivery {
        lease: LeaseId,
        #[source]
        source: Box<Error>,
    },
    #[error("archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("deployment {0} was closed")]
    DeploymentClosed(DeploymentId),
    #[error("task {0} panicked")]
    TaskPanicked(String),
    #[error("tasks did not stop within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl Error {
    /// Cancellation-induced exits are not worth surfacing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
