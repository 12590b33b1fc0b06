//! A client connection bound to a session
//!
//! The connection yields the handshake frame, then the replay backlog, then
//! live events. Dropping it (the client went away) moves the session to
//! `Draining`.

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::protocol::OutboundFrame;
use crate::session::SessionRegistry;
use crate::types::{Event, EventId, Session};

/// Detaches the connection from its session when dropped
struct DisconnectGuard {
    registry: Arc<SessionRegistry>,
    session_id: String,
    generation: u64,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Some(state) = self.registry.detach(&self.session_id, self.generation) {
            debug!(
                session_id = %self.session_id,
                generation = self.generation,
                %state,
                "connection closed"
            );
        }
    }
}

/// Outbound side of one streaming connection
pub struct Connection {
    session: Session,
    backlog: Vec<OutboundFrame>,
    live: broadcast::Receiver<Event>,
    cursor: EventId,
    guard: DisconnectGuard,
}

impl Connection {
    pub(crate) fn new(
        registry: Arc<SessionRegistry>,
        session: Session,
        generation: u64,
        backlog: Vec<OutboundFrame>,
        live: broadcast::Receiver<Event>,
        cursor: EventId,
    ) -> Self {
        let guard = DisconnectGuard {
            registry,
            session_id: session.session_id.clone(),
            generation,
        };
        Self {
            session,
            backlog,
            live,
            cursor,
            guard,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Frames queued before live delivery starts
    pub fn backlog(&self) -> &[OutboundFrame] {
        &self.backlog
    }

    /// Turn the connection into its frame stream
    ///
    /// The stream ends after a terminal frame, when the session is closed, or
    /// when a newer connection supersedes this one.
    pub fn into_frames(self) -> impl Stream<Item = OutboundFrame> + Send + 'static {
        let Connection {
            session,
            backlog,
            mut live,
            mut cursor,
            guard,
        } = self;

        async_stream::stream! {
            let guard = guard;

            for frame in backlog {
                if let Some(id) = frame.event_id() {
                    cursor = cursor.max(id);
                }
                let terminal = frame.is_terminal();
                yield frame;
                if terminal {
                    return;
                }
            }

            loop {
                match live.recv().await {
                    Ok(event) => {
                        if event.id <= cursor {
                            continue;
                        }
                        cursor = event.id;
                        yield OutboundFrame::Event(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            session_id = %session.session_id,
                            skipped,
                            "live consumer lagged, catching up from event log"
                        );
                        match guard.registry.log().replay_after(&session.stream_id, cursor) {
                            Ok(events) => {
                                for event in events {
                                    cursor = event.id;
                                    yield OutboundFrame::Event(event);
                                }
                            }
                            Err(truncated) => {
                                yield OutboundFrame::Truncated {
                                    request_id: Value::Null,
                                    session_id: session.session_id.clone(),
                                    truncated,
                                };
                                return;
                            }
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }
    }
}
