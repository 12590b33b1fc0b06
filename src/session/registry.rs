//! Session registry
//!
//! Tracks every client session, enforces the connection state machine and
//! routes produced events into the owning session's stream. The mapping table
//! is guarded by a single lock, so create/resume/transition/destroy are
//! serialized. Lock order is registry, then event log.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::event_store::{EventLog, ReplayResult};
use crate::types::{ConnectionState, Event, EventId, Session};

/// Errors raised by registry operations
///
/// A failed operation never mutates the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("invalid state transition for session {session_id}: {from} -> {to}")]
    InvalidStateTransition {
        session_id: String,
        from: ConnectionState,
        to: ConnectionState,
    },
}

/// Timeouts and buffer sizes of the registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Detached active sessions start draining after this much inactivity
    pub idle_timeout: Duration,
    /// Draining sessions are closed after this grace period
    pub drain_grace: Duration,
    /// Capacity of each session's live channel
    pub live_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            drain_grace: Duration::from_secs(30),
            live_buffer: 64,
        }
    }
}

/// A connection bound to a session by [`SessionRegistry::attach`]
pub struct Attachment {
    pub session: Session,
    /// Identifies this connection; stale connections cannot drain the session
    pub generation: u64,
    /// Events the client missed, computed atomically with the subscription
    pub replay: ReplayResult,
    /// Newest event id at attach time; live events are all newer
    pub cursor: EventId,
    pub live: broadcast::Receiver<Event>,
}

/// What happened to a recorded payload
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Appended and pushed to the attached connection
    Live(Event),
    /// Appended for later replay; nobody is listening
    Stored(Event),
    /// Session already closed; nothing was appended
    Dropped,
}

impl Delivery {
    pub fn event(&self) -> Option<&Event> {
        match self {
            Delivery::Live(event) | Delivery::Stored(event) => Some(event),
            Delivery::Dropped => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Live(_) => "live",
            Delivery::Stored(_) => "stored",
            Delivery::Dropped => "dropped",
        }
    }
}

/// Outcome of one reaper sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub drained: usize,
    pub closed: usize,
    pub forgotten: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.drained == 0 && self.closed == 0 && self.forgotten == 0
    }
}

struct SessionEntry {
    session: Session,
    live: broadcast::Sender<Event>,
    generation: u64,
    attached: bool,
    last_activity: Instant,
    state_since: Instant,
}

impl SessionEntry {
    fn set_state(&mut self, next: ConnectionState, now: Instant) {
        self.session.state = next;
        self.state_since = now;
    }
}

/// Registry of live client sessions
pub struct SessionRegistry {
    config: RegistryConfig,
    log: Arc<EventLog>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(log: Arc<EventLog>) -> Self {
        Self::with_config(log, RegistryConfig::default())
    }

    pub fn with_config(log: Arc<EventLog>, config: RegistryConfig) -> Self {
        Self {
            config,
            log,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The event log backing every session stream
    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    /// Generate a new session ID
    pub fn generate_session_id() -> String {
        format!("sess_{}", uuid::Uuid::new_v4().simple())
    }

    /// Generate a new stream ID
    pub fn generate_stream_id() -> String {
        format!("strm_{}", uuid::Uuid::new_v4().simple())
    }

    /// Allocate a new session in the `Connecting` state
    pub fn create(&self) -> Session {
        let now = Instant::now();
        let session = Session {
            session_id: Self::generate_session_id(),
            stream_id: Self::generate_stream_id(),
            state: ConnectionState::Connecting,
            created_at: chrono::Utc::now().timestamp(),
        };
        let entry = SessionEntry {
            session: session.clone(),
            live: self.new_live_channel(),
            generation: 0,
            attached: false,
            last_activity: now,
            state_since: now,
        };

        self.sessions
            .lock()
            .insert(session.session_id.clone(), entry);
        debug!(session_id = %session.session_id, stream_id = %session.stream_id, "session created");
        session
    }

    /// Look up an existing session
    pub fn resume(&self, session_id: &str) -> Result<Session, SessionError> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Move a session to `next`, enforcing the state machine
    pub fn transition(
        &self,
        session_id: &str,
        next: ConnectionState,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let from = entry.session.state;
        if !from.can_transition_to(next) {
            return Err(SessionError::InvalidStateTransition {
                session_id: session_id.to_string(),
                from,
                to: next,
            });
        }

        let now = Instant::now();
        if next.is_terminal() {
            self.close_entry(entry, now);
        } else {
            entry.set_state(next, now);
            entry.last_activity = now;
        }
        debug!(session_id, %from, to = %next, "session transition");
        Ok(entry.session.clone())
    }

    /// Close a session and purge its stream
    ///
    /// Active sessions pass through `Draining`. Destroying a closed session is
    /// a no-op.
    pub fn destroy(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let now = Instant::now();
        if entry.session.state == ConnectionState::Active {
            entry.set_state(ConnectionState::Draining, now);
        }
        if !entry.session.state.is_terminal() {
            self.close_entry(entry, now);
            info!(session_id, "session destroyed");
        }
        Ok(entry.session.clone())
    }

    /// Bind a new connection to a session
    ///
    /// The session becomes `Active`, the replay after `last_event_id` is
    /// computed and the live channel subscribed under the same lock that
    /// [`record`](Self::record) takes, so the client sees every event exactly
    /// once. Without `last_event_id` the client has seen nothing and gets the
    /// whole retained stream. A previously attached connection is cut off.
    pub fn attach(
        &self,
        session_id: &str,
        last_event_id: Option<EventId>,
    ) -> Result<Attachment, SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let now = Instant::now();
        match entry.session.state {
            ConnectionState::Connecting | ConnectionState::Draining => {
                entry.set_state(ConnectionState::Active, now);
            }
            ConnectionState::Active => {
                // Dropping the old sender ends the superseded connection
                entry.live = self.new_live_channel();
            }
            ConnectionState::Closed => {
                return Err(SessionError::InvalidStateTransition {
                    session_id: session_id.to_string(),
                    from: ConnectionState::Closed,
                    to: ConnectionState::Active,
                });
            }
        }

        entry.generation += 1;
        entry.attached = true;
        entry.last_activity = now;

        let stream_id = &entry.session.stream_id;
        let replay = self.log.replay_after(stream_id, last_event_id.unwrap_or(0));
        let cursor = self.log.latest_id(stream_id).unwrap_or(0);

        debug!(session_id, generation = entry.generation, ?last_event_id, "connection attached");
        Ok(Attachment {
            session: entry.session.clone(),
            generation: entry.generation,
            replay,
            cursor,
            live: entry.live.subscribe(),
        })
    }

    /// Unbind a connection; the session starts draining if it was current
    pub fn detach(&self, session_id: &str, generation: u64) -> Option<ConnectionState> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(session_id)?;

        if entry.generation != generation {
            return Some(entry.session.state);
        }

        entry.attached = false;
        if entry.session.state == ConnectionState::Active {
            entry.set_state(ConnectionState::Draining, Instant::now());
            debug!(session_id, generation, "connection dropped, session draining");
        }
        Some(entry.session.state)
    }

    /// Mark activity on a session, failing if it can no longer take calls
    pub fn touch(&self, session_id: &str) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        match entry.session.state {
            ConnectionState::Active | ConnectionState::Draining => {
                entry.last_activity = Instant::now();
                Ok(entry.session.clone())
            }
            state => Err(SessionError::InvalidStateTransition {
                session_id: session_id.to_string(),
                from: state,
                to: ConnectionState::Active,
            }),
        }
    }

    /// Append a payload to the session's stream and deliver it live
    ///
    /// Results for closed sessions are dropped rather than resurrecting a
    /// purged stream.
    pub fn record(&self, session_id: &str, payload: Value) -> Result<Delivery, SessionError> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        if entry.session.state.is_terminal() {
            return Ok(Delivery::Dropped);
        }

        entry.last_activity = Instant::now();
        let event = self.log.append(&entry.session.stream_id, payload);

        if entry.attached
            && entry.session.state == ConnectionState::Active
            && entry.live.send(event.clone()).is_ok()
        {
            return Ok(Delivery::Live(event));
        }
        Ok(Delivery::Stored(event))
    }

    /// Expire idle, draining and closed sessions
    pub fn reap(&self, now: Instant) -> ReapReport {
        let mut report = ReapReport::default();
        let idle_timeout = self.config.idle_timeout;
        let grace = self.config.drain_grace;

        let mut sessions = self.sessions.lock();
        sessions.retain(|session_id, entry| {
            let in_state = now.saturating_duration_since(entry.state_since);
            match entry.session.state {
                ConnectionState::Active => {
                    if !entry.attached
                        && now.saturating_duration_since(entry.last_activity) >= idle_timeout
                    {
                        entry.set_state(ConnectionState::Draining, now);
                        report.drained += 1;
                        debug!(%session_id, "idle session draining");
                    }
                    true
                }
                ConnectionState::Connecting | ConnectionState::Draining => {
                    if in_state >= grace {
                        self.close_entry(entry, now);
                        report.closed += 1;
                        info!(%session_id, "session closed after grace period");
                    }
                    true
                }
                ConnectionState::Closed => {
                    if in_state >= grace {
                        report.forgotten += 1;
                        false
                    } else {
                        true
                    }
                }
            }
        });
        report
    }

    /// Number of sessions known to the registry, including closed tombstones
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions currently in `state`
    pub fn count_in_state(&self, state: ConnectionState) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|entry| entry.session.state == state)
            .count()
    }

    fn new_live_channel(&self) -> broadcast::Sender<Event> {
        broadcast::channel(self.config.live_buffer.max(1)).0
    }

    fn close_entry(&self, entry: &mut SessionEntry, now: Instant) {
        entry.set_state(ConnectionState::Closed, now);
        entry.attached = false;
        entry.live = self.new_live_channel();
        self.log.purge(&entry.session.stream_id);
    }
}
