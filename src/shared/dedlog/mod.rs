//! Deduplicated warnings for noisy, non-fatal input problems (malformed chain events).

pub mod log_entry;

pub use log_entry::{start_dedup_logger, warn, FLUSH_PERIOD};
