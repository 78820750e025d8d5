//! Domain events carried by the bus.

use std::fmt;
use std::path::PathBuf;

use super::ids::{BidId, DeploymentId, GroupId, LeaseId, OrderId, Price};

/// Filesystem operation reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl fmt::Display for FsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsOp::Create => "CREATE",
            FsOp::Write => "WRITE",
            FsOp::Remove => "REMOVE",
            FsOp::Rename => "RENAME",
            FsOp::Chmod => "CHMOD",
        };
        f.write_str(s)
    }
}

/// Where a filesystem event landed relative to the home directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsClass {
    /// A `.yaml` file directly inside `<home>/deployments`.
    DeploymentFile,
    /// Any entry directly inside `<home>`.
    ConfigFile,
    Unexpected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub op: FsOp,
    pub class: FsClass,
}

impl FsEvent {
    /// File name component of the path, for log output.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Everything the sources publish. Consumers match exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DeploymentCreated { id: DeploymentId },
    DeploymentUpdated { id: DeploymentId },
    DeploymentClosed { id: DeploymentId },
    GroupClosed { id: GroupId },
    OrderCreated { id: OrderId },
    OrderClosed { id: OrderId },
    BidCreated { id: BidId, price: Price },
    BidClosed { id: BidId, price: Price },
    LeaseCreated { id: LeaseId, price: Price },
    LeaseClosed { id: LeaseId, price: Price },
    Filesystem(FsEvent),
    Error { cause: String },
}

impl Event {
    /// Deployment the event refers to, if it comes from the ledger.
    pub fn deployment(&self) -> Option<&DeploymentId> {
        match self {
            Event::DeploymentCreated { id }
            | Event::DeploymentUpdated { id }
            | Event::DeploymentClosed { id } => Some(id),
            Event::GroupClosed { id } => Some(&id.deployment),
            Event::OrderCreated { id } | Event::OrderClosed { id } => Some(&id.deployment),
            Event::BidCreated { id, .. } | Event::BidClosed { id, .. } => {
                Some(&id.order.deployment)
            }
            Event::LeaseCreated { id, .. } | Event::LeaseClosed { id, .. } => {
                Some(&id.order.deployment)
            }
            Event::Filesystem(_) | Event::Error { .. } => None,
        }
    }

    /// Short name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::DeploymentCreated { .. } => "deployment_created",
            Event::DeploymentUpdated { .. } => "deployment_updated",
            Event::DeploymentClosed { .. } => "deployment_closed",
            Event::GroupClosed { .. } => "group_closed",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderClosed { .. } => "order_closed",
            Event::BidCreated { .. } => "bid_created",
            Event::BidClosed { .. } => "bid_closed",
            Event::LeaseCreated { .. } => "lease_created",
            Event::LeaseClosed { .. } => "lease_closed",
            Event::Filesystem(_) => "filesystem",
            Event::Error { .. } => "error",
        }
    }
}
