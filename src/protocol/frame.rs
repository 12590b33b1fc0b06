//! Protocol frames exchanged over a session connection
//!
//! Inbound frames are decoded from JSON-RPC requests; outbound frames are what
//! the transport writes back, one SSE event each.

use serde::Deserialize;
use serde_json::{json, Value};

use super::jsonrpc::{codes, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use super::mcp::{ServerInfo, PROTOCOL_VERSION};
use crate::event_store::Truncated;
use crate::types::{Event, EventId, Session};

/// Decoded client frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Start a new session
    Open,
    /// Reattach to a session, replaying what came after `last_event_id`
    Resume {
        session_id: Option<String>,
        last_event_id: Option<EventId>,
    },
    CallTool {
        name: String,
        arguments: Value,
    },
    ListTools,
    Ping,
    /// `notifications/initialized`, acknowledged without a response
    Initialized,
    /// Client-initiated close of the session
    Close,
}

/// A decoded frame with the request id it must be answered with
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: Value,
    pub body: InboundFrame,
    /// Sent without an id; the client expects no answer
    pub notification: bool,
}

#[derive(Debug, Deserialize)]
struct ResumeParams {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    #[serde(rename = "lastEventId")]
    last_event_id: Option<EventId>,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

impl Frame {
    /// Decode a raw request body
    ///
    /// Every failure is returned as the JSON-RPC error frame to send back.
    pub fn decode(raw: &[u8]) -> Result<Frame, JsonRpcError> {
        let request: JsonRpcRequest = serde_json::from_slice(raw)
            .map_err(|e| JsonRpcError::parse_error(Value::Null, e.to_string()))?;
        Self::from_request(request)
    }

    /// Map a JSON-RPC request onto a frame
    pub fn from_request(request: JsonRpcRequest) -> Result<Frame, JsonRpcError> {
        let notification = request.is_notification();
        let id = request.id.clone().unwrap_or(Value::Null);

        if !request.is_valid() {
            return Err(JsonRpcError::invalid_request(
                id,
                "jsonrpc must be '2.0'".to_string(),
            ));
        }

        let body = match request.method.as_str() {
            "initialize" => InboundFrame::Open,
            "session/resume" => {
                let params: ResumeParams = parse_params(&id, request.params, true)?;
                InboundFrame::Resume {
                    session_id: params.session_id,
                    last_event_id: params.last_event_id,
                }
            }
            "tools/call" => {
                let params: CallParams = parse_params(&id, request.params, false)?;
                InboundFrame::CallTool {
                    name: params.name,
                    arguments: params.arguments.unwrap_or_else(|| json!({})),
                }
            }
            "tools/list" => InboundFrame::ListTools,
            "ping" => InboundFrame::Ping,
            "notifications/initialized" => InboundFrame::Initialized,
            "session/close" => InboundFrame::Close,
            _ => return Err(JsonRpcError::method_not_found(id, request.method)),
        };

        Ok(Frame {
            id,
            body,
            notification,
        })
    }
}

fn parse_params<T: for<'de> Deserialize<'de>>(
    id: &Value,
    params: Option<Value>,
    optional: bool,
) -> Result<T, JsonRpcError> {
    let params = match params {
        Some(params) => params,
        None if optional => json!({}),
        None => {
            return Err(JsonRpcError::invalid_params(
                id.clone(),
                "Missing parameters".to_string(),
            ))
        }
    };
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(id.clone(), e.to_string()))
}

/// Frame written to the client
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Handshake answer for open and resume
    Session {
        request_id: Value,
        session: Session,
        server: ServerInfo,
        resumed_after: Option<EventId>,
    },
    /// A stream event, replayed or live
    Event(Event),
    /// Replay impossible; the client must open a new session
    Truncated {
        request_id: Value,
        session_id: String,
        truncated: Truncated,
    },
    Error(JsonRpcError),
}

impl OutboundFrame {
    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            OutboundFrame::Session { .. } => "session",
            OutboundFrame::Event(_) => "message",
            OutboundFrame::Truncated { .. } => "truncated",
            OutboundFrame::Error(_) => "error",
        }
    }

    /// Only stream events carry an id a client may resume from
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            OutboundFrame::Event(event) => Some(event.id),
            _ => None,
        }
    }

    /// Ends the connection once written
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboundFrame::Truncated { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            OutboundFrame::Session {
                request_id,
                session,
                server,
                resumed_after,
            } => {
                let mut result = json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": server,
                    "sessionId": session.session_id,
                    "streamId": session.stream_id,
                });
                if let Some(after) = resumed_after {
                    result["resumedAfter"] = json!(after);
                }
                JsonRpcResponse::new(request_id.clone(), result).to_value()
            }
            OutboundFrame::Event(event) => event.payload.clone(),
            OutboundFrame::Truncated {
                request_id,
                session_id,
                truncated,
            } => JsonRpcError::new(
                request_id.clone(),
                codes::HISTORY_TRUNCATED,
                "History truncated".to_string(),
                Some(json!({
                    "sessionId": session_id,
                    "lastEventId": truncated.requested,
                    "oldestEventId": truncated.oldest,
                })),
            )
            .to_value(),
            OutboundFrame::Error(error) => error.to_value(),
        }
    }
}
