//! Chain event source: ledger block events in, typed bus events out.

pub mod source;
pub mod translate;


pub use source::ChainSource;
pub use translate::{translate, TranslateError};
