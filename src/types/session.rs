//! Session types and the connection state machine

use serde::{Deserialize, Serialize};

/// Lifecycle of a client session
///
/// ```text
/// Connecting ──► Active ──► Draining ──► Closed
///      │           │  ▲         │
///      │           │  └─────────┘ (reconnect within grace period)
///      └───────────┴──────────────────► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Active,
    Draining,
    Closed,
}

impl ConnectionState {
    /// Check whether moving from `self` to `next` is allowed
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Active)
                | (Connecting, Closed)
                | (Active, Draining)
                | (Active, Closed)
                | (Draining, Active)
                | (Draining, Closed)
        )
    }

    /// Closed is terminal
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Active => write!(f, "active"),
            ConnectionState::Draining => write!(f, "draining"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// A client session bound to one logical connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "streamId")]
    pub stream_id: String,
    pub state: ConnectionState,
    /// Unix timestamp of the handshake
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}
