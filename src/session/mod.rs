//! Session management for streaming connections
//!
//! - `SessionRegistry`: live sessions, their state machine and live channels
//! - `spawn_reaper`: background expiry of idle and draining sessions

mod reaper;
mod registry;

pub use reaper::spawn_reaper;
pub use registry::{
    Attachment, Delivery, ReapReport, RegistryConfig, SessionError, SessionRegistry,
};
