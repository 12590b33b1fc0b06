//! Streamable HTTP endpoint for MCP sessions
//!
//! ## Endpoints
//! - `POST /mcp` - one JSON-RPC frame per request; `initialize` and
//!   `session/resume` answer with an SSE stream (the session's connection)
//! - `GET /mcp/info` - Server info, session and event log counters
//!
//! ## Headers
//! - `Mcp-Session-Id` - session of the frame, returned on handshakes
//! - `Last-Event-ID` - resume point when `session/resume` omits `lastEventId`

pub mod handler;

use axum::response::sse::Event as SseEvent;

use crate::protocol::OutboundFrame;

/// Header carrying the session id
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Header carrying the last event id a client saw
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Convert an outbound frame into an SSE event
pub fn to_sse_event(frame: &OutboundFrame) -> SseEvent {
    let event = SseEvent::default()
        .event(frame.event_name())
        .data(frame.to_json().to_string());
    match frame.event_id() {
        Some(id) => event.id(id.to_string()),
        None => event,
    }
}
