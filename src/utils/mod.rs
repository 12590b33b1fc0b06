//! Utility functions and helpers
//!
//! This module contains the logging setup shared by the binary and tests.

pub mod logging;

pub use logging::init_tracing;
