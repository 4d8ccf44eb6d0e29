//! Shared utilities for fund-pipeline
//!
//! Ambient helpers used by every binary in the workspace. Today that is
//! tracing setup only.

pub mod logging;

pub use logging::{LogFormat, init_tracing, init_tracing_with};
