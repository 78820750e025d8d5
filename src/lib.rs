#[path = "shared/dedlog/mod.rs"]
pub mod dedlog;
#[path = "shared/retry/mod.rs"]
pub mod retry;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod app;
pub mod archive;
pub mod bus;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod fswatch;
pub mod gateway;
pub mod handler;
pub mod http;
pub mod ledger;
pub mod model;
pub mod poller;
pub mod shutdown;
pub mod tracker;
