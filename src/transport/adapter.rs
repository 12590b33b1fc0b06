//! Transport adapter
//!
//! Turns decoded protocol frames into registry and dispatcher operations and
//! tells the wire layer what to send back. Nothing here knows about HTTP.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::connection::Connection;
use crate::protocol::{codes, Frame, InboundFrame, JsonRpcError, JsonRpcResponse, OutboundFrame, ServerInfo};
use crate::session::{Delivery, SessionError, SessionRegistry};
use crate::tools::ToolDispatcher;
use crate::types::{CallResult, EventId, Session};

/// Errors terminating one exchange; the session keeps its prior state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0} requires a session id")]
    SessionRequired(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// JSON-RPC error frame answering the request `id`
    pub fn to_jsonrpc(&self, id: Value) -> JsonRpcError {
        let code = match self {
            ProtocolError::Session(SessionError::NotFound(_)) => codes::SESSION_NOT_FOUND,
            ProtocolError::Session(SessionError::InvalidStateTransition { .. }) => {
                codes::INVALID_SESSION_STATE
            }
            ProtocolError::SessionRequired(_) => codes::SESSION_REQUIRED,
            ProtocolError::Internal(_) => codes::INTERNAL_ERROR,
        };
        JsonRpcError::new(id, code, self.to_string(), None)
    }
}

/// What the wire layer must do with an inbound frame
pub enum Reply {
    /// Stream this connection back to the client
    Stream(Connection),
    /// Answer inline with a JSON-RPC response
    Json(Value),
    /// A tool call was accepted; its result travels on the session stream
    Accepted(Value),
    /// Notification acknowledged, nothing to send
    Ack,
    Error(JsonRpcError),
}

/// Session-aware front of the tool server
pub struct TransportAdapter {
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<ToolDispatcher>,
    server: ServerInfo,
}

impl TransportAdapter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<ToolDispatcher>,
        server: ServerInfo,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            server,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    /// Decode and handle one raw frame
    ///
    /// `session_id` and `last_event_id` come from the transport (headers) and
    /// are used when the frame itself does not name them. A `last_event_id`
    /// that is not an event id rejects the frame.
    pub async fn handle(
        &self,
        session_id: Option<&str>,
        last_event_id: Option<&str>,
        raw: &[u8],
    ) -> Reply {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(code = err.code(), "rejected malformed frame");
                return Reply::Error(err);
            }
        };

        let last_event_id = match last_event_id {
            None => None,
            Some(value) => match value.parse::<EventId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    debug!(last_event_id = value, "rejected malformed Last-Event-ID");
                    return Reply::Error(JsonRpcError::invalid_params(
                        frame.id,
                        format!("Last-Event-ID must be an event id, got '{value}'"),
                    ));
                }
            },
        };

        self.dispatch(session_id, last_event_id, frame).await
    }

    /// Handle an already decoded frame
    pub async fn dispatch(
        &self,
        session_id: Option<&str>,
        last_event_id: Option<EventId>,
        frame: Frame,
    ) -> Reply {
        let Frame {
            id,
            body,
            notification,
        } = frame;

        let result = match body {
            InboundFrame::Open => self.open(id.clone()).map(Reply::Stream),
            InboundFrame::Resume {
                session_id: resume_id,
                last_event_id: resume_after,
            } => match resume_id.as_deref().or(session_id) {
                Some(sid) => self
                    .resume(id.clone(), sid, resume_after.or(last_event_id))
                    .map(Reply::Stream),
                None => Err(ProtocolError::SessionRequired("session/resume")),
            },
            InboundFrame::CallTool { name, arguments } => match session_id {
                Some(sid) => self
                    .call(sid, id.clone(), name, arguments)
                    .await
                    .map(|delivery| {
                        Reply::Accepted(
                            JsonRpcResponse::new(
                                id.clone(),
                                json!({
                                    "eventId": delivery.event().map(|e| e.id),
                                    "delivery": delivery.as_str(),
                                }),
                            )
                            .to_value(),
                        )
                    }),
                None => Err(ProtocolError::SessionRequired("tools/call")),
            },
            InboundFrame::ListTools => Ok(Reply::Json(
                JsonRpcResponse::new(id.clone(), json!({ "tools": self.dispatcher.list_tools() }))
                    .to_value(),
            )),
            InboundFrame::Ping => Ok(Reply::Json(
                JsonRpcResponse::new(id.clone(), json!({})).to_value(),
            )),
            InboundFrame::Initialized => Ok(Reply::Ack),
            InboundFrame::Close => match session_id {
                Some(sid) => self.close(sid).map(|session| {
                    Reply::Json(
                        JsonRpcResponse::new(
                            id.clone(),
                            json!({ "sessionId": session.session_id, "state": session.state }),
                        )
                        .to_value(),
                    )
                }),
                None => Err(ProtocolError::SessionRequired("session/close")),
            },
        };

        let reply = result.unwrap_or_else(|err| {
            debug!(error = %err, "frame rejected");
            Reply::Error(err.to_jsonrpc(id))
        });

        // Notifications still take effect but are never answered
        match reply {
            Reply::Json(_) | Reply::Accepted(_) if notification => Reply::Ack,
            reply => reply,
        }
    }

    /// Create a session and bind a connection to it
    pub fn open(&self, request_id: Value) -> Result<Connection, ProtocolError> {
        let session = self.registry.create();
        let attachment = match self.registry.attach(&session.session_id, None) {
            Ok(attachment) => attachment,
            Err(err) => {
                let _ = self.registry.destroy(&session.session_id);
                return Err(err.into());
            }
        };

        info!(session_id = %session.session_id, "session opened");
        let handshake = OutboundFrame::Session {
            request_id,
            session: attachment.session.clone(),
            server: self.server.clone(),
            resumed_after: None,
        };

        Ok(Connection::new(
            self.registry.clone(),
            attachment.session,
            attachment.generation,
            vec![handshake],
            attachment.live,
            attachment.cursor,
        ))
    }

    /// Reattach to a session, replaying what came after `last_event_id`
    ///
    /// A truncated history is reported as the last frame of the connection;
    /// the client has to open a fresh session.
    pub fn resume(
        &self,
        request_id: Value,
        session_id: &str,
        last_event_id: Option<EventId>,
    ) -> Result<Connection, ProtocolError> {
        let attachment = self.registry.attach(session_id, last_event_id)?;

        let mut backlog = vec![OutboundFrame::Session {
            request_id: request_id.clone(),
            session: attachment.session.clone(),
            server: self.server.clone(),
            resumed_after: last_event_id,
        }];

        match attachment.replay {
            Ok(events) => {
                info!(session_id, replayed = events.len(), "session resumed");
                backlog.extend(events.into_iter().map(OutboundFrame::Event));
            }
            Err(truncated) => {
                info!(session_id, error = %truncated, "resume hit truncated history");
                backlog.push(OutboundFrame::Truncated {
                    request_id,
                    session_id: session_id.to_string(),
                    truncated,
                });
            }
        }

        Ok(Connection::new(
            self.registry.clone(),
            attachment.session,
            attachment.generation,
            backlog,
            attachment.live,
            attachment.cursor,
        ))
    }

    /// Invoke a tool for a session and record the result on its stream
    ///
    /// The invocation runs on its own task: if the caller goes away the
    /// result is still recorded (or dropped if the session closed meanwhile).
    pub async fn call(
        &self,
        session_id: &str,
        request_id: Value,
        name: String,
        arguments: Value,
    ) -> Result<Delivery, ProtocolError> {
        self.registry.touch(session_id)?;

        let registry = self.registry.clone();
        let dispatcher = self.dispatcher.clone();
        let session_id = session_id.to_string();

        let task = tokio::spawn(async move {
            let result = dispatcher.invoke(&name, arguments).await;
            let payload = tool_result_payload(request_id, &result);
            let delivery = registry
                .record(&session_id, payload)
                .unwrap_or(Delivery::Dropped);
            debug!(
                %session_id,
                tool = %name,
                success = result.success,
                delivery = delivery.as_str(),
                "tool call finished"
            );
            delivery
        });

        task.await
            .map_err(|e| ProtocolError::Internal(e.to_string()))
    }

    /// Client-initiated close
    pub fn close(&self, session_id: &str) -> Result<Session, ProtocolError> {
        Ok(self.registry.destroy(session_id)?)
    }
}

/// Event payload of a finished tool call
pub fn tool_result_payload(request_id: Value, result: &CallResult) -> Value {
    JsonRpcResponse::new(
        request_id,
        json!({
            "success": result.success,
            "data": result.data,
            "error": result.error,
        }),
    )
    .to_value()
}
