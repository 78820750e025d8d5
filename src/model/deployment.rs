//! In-memory view of one tracked deployment: its open orders and leases.

use std::collections::HashSet;

use super::event::Event;
use super::ids::{DeploymentId, LeaseId, OrderId};

/// Result of applying one event to [`DeploymentData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Event concerns another deployment or is not a ledger event.
    Ignored,
    /// Event belongs to the tracked deployment but changes nothing.
    Observed,
    OrderOpened(OrderId),
    OrderClosed(OrderId),
    LeaseOpened(LeaseId),
    LeaseClosed(LeaseId),
    /// Lease for an order that was never opened; dropped to keep leases anchored to orders.
    LeaseOrphaned(LeaseId),
    DeploymentClosed,
}

impl Transition {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Transition::OrderOpened(_)
                | Transition::OrderClosed(_)
                | Transition::LeaseOpened(_)
                | Transition::LeaseClosed(_)
        )
    }
}

/// Read-only view of leases handed to the availability poller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeaseSnapshot {
    pub leases: Vec<LeaseId>,
    /// At least one lease exists and every open order has one.
    pub expected: bool,
}

#[derive(Debug, Clone)]
pub struct DeploymentData {
    id: DeploymentId,
    manifest: Vec<u8>,
    open_orders: HashSet<OrderId>,
    open_leases: HashSet<LeaseId>,
    seen_orders: HashSet<OrderId>,
}

impl DeploymentData {
    pub fn new(id: DeploymentId, manifest: Vec<u8>) -> Self {
        Self {
            id,
            manifest,
            open_orders: HashSet::new(),
            open_leases: HashSet::new(),
            seen_orders: HashSet::new(),
        }
    }

    pub fn id(&self) -> &DeploymentId {
        &self.id
    }

    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }

    pub fn open_orders(&self) -> &HashSet<OrderId> {
        &self.open_orders
    }

    pub fn open_leases(&self) -> &HashSet<LeaseId> {
        &self.open_leases
    }

    fn owns(&self, id: &DeploymentId) -> bool {
        self.id.matches(id)
    }

    /// Applies a bus event. Set semantics make duplicates and stale closes no-ops.
    pub fn apply(&mut self, event: &Event) -> Transition {
        match event {
            Event::DeploymentCreated { id } | Event::DeploymentUpdated { id } => {
                if self.owns(id) {
                    Transition::Observed
                } else {
                    Transition::Ignored
                }
            }
            Event::DeploymentClosed { id } => {
                if self.owns(id) {
                    Transition::DeploymentClosed
                } else {
                    Transition::Ignored
                }
            }
            Event::GroupClosed { id } => {
                if self.owns(&id.deployment) {
                    Transition::Observed
                } else {
                    Transition::Ignored
                }
            }
            Event::OrderCreated { id } => {
                if !self.owns(&id.deployment) {
                    return Transition::Ignored;
                }
                self.seen_orders.insert(id.clone());
                if self.open_orders.insert(id.clone()) {
                    Transition::OrderOpened(id.clone())
                } else {
                    Transition::Observed
                }
            }
            Event::OrderClosed { id } => {
                if !self.owns(&id.deployment) {
                    return Transition::Ignored;
                }
                if self.open_orders.remove(id) {
                    Transition::OrderClosed(id.clone())
                } else {
                    Transition::Observed
                }
            }
            Event::BidCreated { id, .. } | Event::BidClosed { id, .. } => {
                if self.owns(&id.order.deployment) {
                    Transition::Observed
                } else {
                    Transition::Ignored
                }
            }
            Event::LeaseCreated { id, .. } => {
                if !self.owns(id.deployment()) {
                    return Transition::Ignored;
                }
                if !self.seen_orders.contains(&id.order) {
                    return Transition::LeaseOrphaned(id.clone());
                }
                // Duplicates still report LeaseOpened: the dispatcher owns idempotency.
                self.open_leases.insert(id.clone());
                Transition::LeaseOpened(id.clone())
            }
            Event::LeaseClosed { id, .. } => {
                if !self.owns(id.deployment()) {
                    return Transition::Ignored;
                }
                if self.open_leases.remove(id) {
                    Transition::LeaseClosed(id.clone())
                } else {
                    Transition::Observed
                }
            }
            Event::Filesystem(_) | Event::Error { .. } => Transition::Ignored,
        }
    }

    pub fn expected_leases(&self) -> bool {
        if self.open_leases.is_empty() {
            return false;
        }
        self.open_orders
            .iter()
            .all(|order| self.open_leases.iter().any(|lease| &lease.order == order))
    }

    pub fn snapshot(&self) -> LeaseSnapshot {
        let mut leases: Vec<LeaseId> = self.open_leases.iter().cloned().collect();
        leases.sort();
        LeaseSnapshot {
            leases,
            expected: self.expected_leases(),
        }
    }
}
