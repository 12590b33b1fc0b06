//! Event types for the bounded stream log
//!
//! An event is one immutable, id-stamped unit of protocol output. Events are
//! owned by the event log and handed out as clones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of an event, unique and strictly increasing within one stream
pub type EventId = u64;

/// A single entry of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonically increasing id, starting at 1 for each stream
    pub id: EventId,
    /// Identifier of the owning stream
    #[serde(rename = "streamId")]
    pub stream_id: String,
    /// Opaque serialized payload
    pub payload: Value,
}

impl Event {
    /// Create a new event
    pub fn new(id: EventId, stream_id: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            stream_id: stream_id.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_serializes_camel_case_stream_id() {
        let event = Event::new(7, "strm_1", json!({"ok": true}));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["id"], 7);
        assert_eq!(value["streamId"], "strm_1");
        assert_eq!(value["payload"]["ok"], true);
    }
}
