//! MCP HTTP handlers

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use serde::Serialize;

use super::{to_sse_event, LAST_EVENT_ID_HEADER, SESSION_HEADER};
use crate::api::state::AppState;
use crate::event_store::EventLogStats;
use crate::protocol::{codes, PROTOCOL_VERSION};
use crate::transport::{Connection, Reply};
use crate::types::ConnectionState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// HTTP status for a JSON-RPC error code
fn status_for(code: i32) -> StatusCode {
    match code {
        codes::PARSE_ERROR | codes::INVALID_REQUEST | codes::INVALID_PARAMS => {
            StatusCode::BAD_REQUEST
        }
        codes::SESSION_REQUIRED => StatusCode::BAD_REQUEST,
        codes::SESSION_NOT_FOUND => StatusCode::NOT_FOUND,
        codes::INVALID_SESSION_STATE => StatusCode::CONFLICT,
        codes::INTERNAL_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

/// Stream a connection as `text/event-stream`
fn sse_response(connection: Connection, keep_alive: Duration) -> Response {
    let session_id = connection.session().session_id.clone();
    let stream = connection
        .into_frames()
        .map(|frame| Ok::<_, Infallible>(to_sse_event(&frame)));

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// POST /mcp - Handle one JSON-RPC frame
pub async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = header_str(&headers, SESSION_HEADER);
    let last_event_id = header_str(&headers, LAST_EVENT_ID_HEADER);

    match state.adapter.handle(session_id, last_event_id, &body).await {
        Reply::Stream(connection) => sse_response(connection, state.keep_alive),
        Reply::Json(value) => (StatusCode::OK, Json(value)).into_response(),
        Reply::Accepted(value) => (StatusCode::ACCEPTED, Json(value)).into_response(),
        Reply::Ack => StatusCode::ACCEPTED.into_response(),
        Reply::Error(error) => (status_for(error.code()), Json(error)).into_response(),
    }
}

/// Session counters by state
#[derive(Debug, Serialize)]
pub struct SessionCounts {
    /// Every known session, closed tombstones included
    pub total: usize,
    pub connecting: usize,
    pub active: usize,
    pub draining: usize,
    pub closed: usize,
}

/// GET /mcp/info - Get server info
#[derive(Debug, Serialize)]
pub struct ServerInfoResponse {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub tool_count: usize,
    pub sessions: SessionCounts,
    pub event_log: EventLogStats,
}

pub async fn server_info_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let adapter = &state.adapter;
    let registry = adapter.registry();
    let info = ServerInfoResponse {
        name: adapter.server().name.clone(),
        version: adapter.server().version.clone(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        tool_count: adapter.dispatcher().len(),
        sessions: SessionCounts {
            total: registry.len(),
            connecting: registry.count_in_state(ConnectionState::Connecting),
            active: registry.count_in_state(ConnectionState::Active),
            draining: registry.count_in_state(ConnectionState::Draining),
            closed: registry.count_in_state(ConnectionState::Closed),
        },
        event_log: registry.log().stats(),
    };
    Json(info)
}
