//! Filesystem event source for the home and deployments directories.

pub mod classify;
pub mod source;

#[cfg(test)]
mod classify_test;

pub use classify::classify;
pub use source::FsSource;
