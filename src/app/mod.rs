pub mod app;

pub use app::{init_config, App, CreateRequest};
