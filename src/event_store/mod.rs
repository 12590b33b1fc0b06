//! Event Log Module for resumable streams
//!
//! This module provides the bounded history that makes resumption possible:
//! - `EventLog`: per-stream, capacity-bounded, ordered event storage
//! - `Truncated`: replay signal for history that fell out of the window
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌───────────┐    ┌──────────────┐    ┌───────────────────┐
//! │ tool call │───►│ append(S, p) │───►│ evict oldest when │
//! │ result    │    │ id = next++  │    │ len > capacity    │
//! └───────────┘    └──────────────┘    └───────────────────┘
//!
//! Read Path (Reconnect):
//! ┌────────────────────┐    ┌────────────────────────────┐
//! │ replay_after(S, n) │───►│ events with id > n         │
//! │                    │    │ or Truncated if n evicted  │
//! └────────────────────┘    └────────────────────────────┘
//! ```

mod log;

pub use log::{
    EventLog, EventLogConfig, EventLogStats, ReplayResult, Truncated,
    DEFAULT_MAX_EVENTS_PER_STREAM,
};
