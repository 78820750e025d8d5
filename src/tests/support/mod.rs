// Shared test support code: scripted collaborators, chain event builders and mock HTTP servers.

pub mod events;
pub mod fakes;
pub mod mock;

pub use events::{lease_created, order_created, raw_event};
pub use fakes::{service, FakeGateway, FakeLedger, Script};
pub use mock::MockServer;
