//! Event Log - bounded per-stream history
//!
//! The EventLog keeps the most recent events of every stream in memory so a
//! reconnecting client can be replayed what it missed. Each stream holds at
//! most `max_events_per_stream` events; older ones are evicted FIFO.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{Event, EventId};

/// Default number of events retained per stream
pub const DEFAULT_MAX_EVENTS_PER_STREAM: usize = 100;

/// Configuration for the EventLog
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Capacity of each stream; 0 disables retention entirely
    pub max_events_per_stream: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            max_events_per_stream: DEFAULT_MAX_EVENTS_PER_STREAM,
        }
    }
}

impl EventLogConfig {
    pub fn with_capacity(max_events_per_stream: usize) -> Self {
        Self {
            max_events_per_stream,
        }
    }
}

/// Replay could not be served because the requested point was evicted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("history truncated: requested events after {requested}, oldest retained is {oldest}")]
pub struct Truncated {
    /// The last event id the client reported
    pub requested: EventId,
    /// Oldest id still retained for the stream
    pub oldest: EventId,
}

/// Result type for replay requests
pub type ReplayResult = Result<Vec<Event>, Truncated>;

/// Counters exposed on the info endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventLogStats {
    pub streams: usize,
    pub events: usize,
    pub capacity: usize,
}

#[derive(Debug, Default)]
struct StreamLog {
    /// Id the next appended event receives
    next_id: EventId,
    events: VecDeque<Event>,
}

impl StreamLog {
    fn new() -> Self {
        Self {
            next_id: 1,
            events: VecDeque::new(),
        }
    }

    /// True once at least one appended event is no longer retained
    fn has_evicted(&self) -> bool {
        match self.events.front() {
            Some(oldest) => oldest.id > 1,
            None => self.next_id > 1,
        }
    }
}

/// In-memory, capacity-bounded event log keyed by stream id
///
/// Streams are created lazily on first append. All operations take a short
/// internal lock and never block on I/O.
pub struct EventLog {
    config: EventLogConfig,
    streams: Mutex<HashMap<String, StreamLog>>,
}

impl EventLog {
    /// Create a new EventLog with default config
    pub fn new() -> Self {
        Self::with_config(EventLogConfig::default())
    }

    /// Create a new EventLog with custom config
    pub fn with_config(config: EventLogConfig) -> Self {
        Self {
            config,
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Shorthand for a log with the given per-stream capacity
    pub fn with_capacity(max_events_per_stream: usize) -> Self {
        Self::with_config(EventLogConfig::with_capacity(max_events_per_stream))
    }

    /// Append a payload to a stream, evicting the oldest event when full
    pub fn append(&self, stream_id: &str, payload: Value) -> Event {
        let capacity = self.config.max_events_per_stream;
        let mut streams = self.streams.lock();
        let stream = streams
            .entry(stream_id.to_string())
            .or_insert_with(StreamLog::new);

        let event = Event::new(stream.next_id, stream_id, payload);
        stream.next_id += 1;

        if capacity == 0 {
            return event;
        }

        while stream.events.len() >= capacity {
            stream.events.pop_front();
        }
        stream.events.push_back(event.clone());
        event
    }

    /// Return every retained event with `id > last_event_id`, ascending
    ///
    /// Fails with [`Truncated`] when events were evicted and `last_event_id`
    /// is older than the oldest one still retained.
    pub fn replay_after(&self, stream_id: &str, last_event_id: EventId) -> ReplayResult {
        if self.config.max_events_per_stream == 0 {
            return Ok(Vec::new());
        }

        let streams = self.streams.lock();
        let Some(stream) = streams.get(stream_id) else {
            return Ok(Vec::new());
        };
        let Some(oldest) = stream.events.front().map(|e| e.id) else {
            return Ok(Vec::new());
        };

        if stream.has_evicted() && last_event_id < oldest {
            return Err(Truncated {
                requested: last_event_id,
                oldest,
            });
        }

        Ok(stream
            .events
            .iter()
            .filter(|e| e.id > last_event_id)
            .cloned()
            .collect())
    }

    /// Drop all events of a stream. Unknown streams are ignored.
    pub fn purge(&self, stream_id: &str) {
        self.streams.lock().remove(stream_id);
    }

    /// Id of the newest event ever appended to a stream
    pub fn latest_id(&self, stream_id: &str) -> Option<EventId> {
        self.streams
            .lock()
            .get(stream_id)
            .and_then(|s| s.next_id.checked_sub(1))
            .filter(|id| *id > 0)
    }

    /// Events currently retained for a stream, oldest first
    pub fn retained(&self, stream_id: &str) -> Vec<Event> {
        self.streams
            .lock()
            .get(stream_id)
            .map(|s| s.events.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> EventLogStats {
        let streams = self.streams.lock();
        EventLogStats {
            streams: streams.len(),
            events: streams.values().map(|s| s.events.len()).sum(),
            capacity: self.config.max_events_per_stream,
        }
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
