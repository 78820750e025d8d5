// HTTP plumbing shared by the ledger and gateway clients.

pub mod client;
pub mod request;

pub use client::{create_client, HyperClient};
pub use request::{make_get_request, make_method_request, RequestError, Response};
