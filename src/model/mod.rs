//! Domain model: identifiers, bus events and the tracked deployment state.

pub mod deployment;
pub mod event;
pub mod ids;
pub mod status;


pub use deployment::{DeploymentData, LeaseSnapshot, Transition};
pub use event::{Event, FsClass, FsEvent, FsOp};
pub use ids::{Address, BidId, DeploymentId, GroupId, LeaseId, OrderId, Price};
pub use status::{all_ready, ServiceStatus};
