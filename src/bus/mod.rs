//! Event bus decoupling the chain and filesystem sources from their consumers.

pub mod bus;

#[cfg(test)]
mod bus_test;

pub use bus::{Bus, Subscription, DEFAULT_CAPACITY};
