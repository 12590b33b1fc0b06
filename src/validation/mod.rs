//! Argument validation for tool calls
//!
//! Tool input schemas are compiled once when the tool is registered and
//! checked on every invocation.

mod schema;

pub use schema::{ArgumentValidator, SchemaError};
