//! Ledger identifiers for deployments, groups, orders, bids and leases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bech32 account address. Compared by exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies one deployment: owner plus deployment sequence (dseq).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeploymentId {
    pub owner: Address,
    pub dseq: u64,
}

impl DeploymentId {
    pub fn new(owner: impl Into<Address>, dseq: u64) -> Self {
        Self {
            owner: owner.into(),
            dseq,
        }
    }

    /// Returns true if `other` belongs to the same owner and sequence.
    pub fn matches(&self, other: &DeploymentId) -> bool {
        self.dseq == other.dseq && self.owner == other.owner
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.dseq)
    }
}

/// One resource group of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId {
    pub deployment: DeploymentId,
    pub gseq: u32,
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.deployment, self.gseq)
    }
}

/// Auction request for one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId {
    pub deployment: DeploymentId,
    pub gseq: u32,
    pub oseq: u32,
}

impl OrderId {
    pub fn new(deployment: DeploymentId, gseq: u32, oseq: u32) -> Self {
        Self {
            deployment,
            gseq,
            oseq,
        }
    }

    pub fn group(&self) -> GroupId {
        GroupId {
            deployment: self.deployment.clone(),
            gseq: self.gseq,
        }
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.deployment, self.gseq, self.oseq)
    }
}

/// A provider's bid on an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BidId {
    pub order: OrderId,
    pub provider: Address,
}

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order, self.provider)
    }
}

/// The winning provider for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseId {
    pub order: OrderId,
    pub provider: Address,
}

impl LeaseId {
    pub fn new(order: OrderId, provider: impl Into<Address>) -> Self {
        Self {
            order,
            provider: provider.into(),
        }
    }

    pub fn deployment(&self) -> &DeploymentId {
        &self.order.deployment
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.order, self.provider)
    }
}

/// Decimal coin amount as reported by the ledger, e.g. `{denom: "uakt", amount: "12.5"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Price {
    pub denom: String,
    pub amount: String,
}

impl Price {
    pub fn new(amount: impl Into<String>, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}
