//! End-to-end tests: every component wired by `App` against in-memory collaborators.

mod cases_pipeline_test;

pub mod support;
