//! Integration tests for resumable sessions
//!
//! These drive the transport adapter directly and read the frame stream of
//! each connection, the same stream the SSE handler writes to the wire.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde_json::{json, Value};

use enrich_mcp::collaborator::{ExternalService, ServiceError};
use enrich_mcp::event_store::{EventLog, EventLogConfig};
use enrich_mcp::protocol::{codes, McpTool, OutboundFrame, ServerInfo, Tool, ToolError};
use enrich_mcp::session::{Delivery, RegistryConfig, SessionError, SessionRegistry};
use enrich_mcp::tools::{ContactEnrichTool, ToolDispatcher};
use enrich_mcp::transport::{ProtocolError, Reply, TransportAdapter};
use enrich_mcp::types::{ConnectionState, EventId};

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> McpTool {
        McpTool {
            name: "echo".to_string(),
            description: "Echo the given text".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        }
    }

    async fn call(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(json!({ "text": arguments["text"] }))
    }
}

struct TimingOutService;

#[async_trait]
impl ExternalService for TimingOutService {
    async fn call(&self, _request: Value) -> Result<Value, ServiceError> {
        Err(ServiceError::Timeout(Duration::from_millis(50)))
    }
}

fn setup_adapter(capacity: usize) -> Arc<TransportAdapter> {
    setup_adapter_with(capacity, RegistryConfig::default())
}

fn setup_adapter_with(capacity: usize, config: RegistryConfig) -> Arc<TransportAdapter> {
    let log = Arc::new(EventLog::with_config(EventLogConfig::with_capacity(capacity)));
    let registry = Arc::new(SessionRegistry::with_config(log, config));

    let mut dispatcher = ToolDispatcher::new();
    dispatcher
        .register(Arc::new(EchoTool))
        .unwrap()
        .register(Arc::new(ContactEnrichTool::new(Arc::new(TimingOutService))))
        .unwrap();

    Arc::new(TransportAdapter::new(
        registry,
        Arc::new(dispatcher),
        ServerInfo::default(),
    ))
}

async fn next_frame<S>(frames: &mut S) -> OutboundFrame
where
    S: Stream<Item = OutboundFrame> + Unpin,
{
    tokio::time::timeout(Duration::from_secs(2), frames.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended early")
}

async fn echo(adapter: &TransportAdapter, session_id: &str, text: &str) -> Delivery {
    adapter
        .call(session_id, json!(text), "echo".to_string(), json!({ "text": text }))
        .await
        .unwrap()
}

fn event_ids(frames: &[OutboundFrame]) -> Vec<EventId> {
    frames.iter().filter_map(OutboundFrame::event_id).collect()
}

#[tokio::test]
async fn test_open_and_call_delivers_result_live() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    let mut frames = Box::pin(connection.into_frames());

    match next_frame(&mut frames).await {
        OutboundFrame::Session { session, .. } => {
            assert_eq!(session.session_id, session_id);
            assert_eq!(session.state, ConnectionState::Active);
        }
        other => panic!("expected handshake, got {other:?}"),
    }

    let delivery = echo(&adapter, &session_id, "hi").await;
    assert_eq!(delivery.as_str(), "live");

    match next_frame(&mut frames).await {
        OutboundFrame::Event(event) => {
            assert_eq!(event.id, 1);
            assert_eq!(event.payload["id"], "hi");
            assert_eq!(event.payload["result"]["success"], true);
            assert_eq!(event.payload["result"]["data"]["text"], "hi");
        }
        other => panic!("expected event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resume_replays_missed_events_then_goes_live() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    let mut frames = Box::pin(connection.into_frames());

    next_frame(&mut frames).await;
    for text in ["a", "b", "c"] {
        echo(&adapter, &session_id, text).await;
    }
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(1));

    // Client goes away having seen event 1
    drop(frames);
    let session = adapter.registry().resume(&session_id).unwrap();
    assert_eq!(session.state, ConnectionState::Draining);

    let stored = echo(&adapter, &session_id, "d").await;
    assert_eq!(stored.as_str(), "stored");
    assert_eq!(stored.event().map(|e| e.id), Some(4));

    let connection = adapter.resume(json!(2), &session_id, Some(1)).unwrap();
    assert_eq!(connection.session().state, ConnectionState::Active);
    assert_eq!(event_ids(connection.backlog()), vec![2, 3, 4]);

    let mut frames = Box::pin(connection.into_frames());
    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(next_frame(&mut frames).await);
    }
    echo(&adapter, &session_id, "e").await;
    received.push(next_frame(&mut frames).await);

    assert!(matches!(
        received[0],
        OutboundFrame::Session {
            resumed_after: Some(1),
            ..
        }
    ));
    assert_eq!(event_ids(&received), vec![2, 3, 4, 5]);
}

#[tokio::test]
async fn test_resume_without_last_event_id_replays_whole_stream() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    // Dropped before any event was received
    drop(connection);

    let stored = echo(&adapter, &session_id, "a").await;
    assert_eq!(stored.as_str(), "stored");

    let connection = adapter.resume(json!(2), &session_id, None).unwrap();
    assert_eq!(event_ids(connection.backlog()), vec![1]);

    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(1));

    echo(&adapter, &session_id, "b").await;
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(2));
}

#[tokio::test]
async fn test_resume_past_evicted_history_is_truncated() {
    let adapter = setup_adapter(3);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    drop(connection);

    for text in ["a", "b", "c", "d"] {
        echo(&adapter, &session_id, text).await;
    }

    let connection = adapter.resume(json!(2), &session_id, Some(1)).unwrap();
    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    match next_frame(&mut frames).await {
        OutboundFrame::Truncated { truncated, .. } => {
            assert_eq!(truncated.requested, 1);
            assert_eq!(truncated.oldest, 2);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
    assert!(frames.next().await.is_none());
    drop(frames);

    // A cursor still inside the window resumes normally
    let connection = adapter.resume(json!(3), &session_id, Some(2)).unwrap();
    assert_eq!(event_ids(connection.backlog()), vec![3, 4]);
}

#[tokio::test]
async fn test_concurrent_calls_are_delivered_once_in_order() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;

    let calls = (0..10).map(|i| {
        let adapter = adapter.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move { echo(&adapter, &session_id, &i.to_string()).await })
    });
    let deliveries = futures::future::join_all(calls).await;
    assert!(deliveries
        .into_iter()
        .all(|d| d.map(|d| d.as_str() == "live").unwrap_or(false)));

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(next_frame(&mut frames).await.event_id().unwrap());
    }
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());
}

fn small_live_buffer() -> RegistryConfig {
    RegistryConfig {
        live_buffer: 2,
        ..RegistryConfig::default()
    }
}

#[tokio::test]
async fn test_lagging_consumer_catches_up_from_log() {
    let adapter = setup_adapter_with(100, small_live_buffer());
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    // The live channel overflows before the stream is ever polled
    for i in 0..10 {
        let delivery = echo(&adapter, &session_id, &i.to_string()).await;
        assert_eq!(delivery.as_str(), "live");
    }

    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(next_frame(&mut frames).await.event_id().unwrap());
    }
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());

    echo(&adapter, &session_id, "after").await;
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(11));
}

#[tokio::test]
async fn test_lagging_consumer_past_evicted_history_is_truncated() {
    let adapter = setup_adapter_with(3, small_live_buffer());
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    for i in 0..10 {
        echo(&adapter, &session_id, &i.to_string()).await;
    }

    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    match next_frame(&mut frames).await {
        OutboundFrame::Truncated {
            session_id: truncated_session,
            truncated,
            ..
        } => {
            assert_eq!(truncated_session, session_id);
            assert_eq!(truncated.requested, 0);
            assert_eq!(truncated.oldest, 8);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
    assert!(frames.next().await.is_none());
}

#[tokio::test]
async fn test_call_notification_is_recorded_but_not_answered() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    let raw = json!({
        "jsonrpc": "2.0",
        "method": "tools/call",
        "params": { "name": "echo", "arguments": { "text": "quiet" } }
    })
    .to_string();
    assert!(matches!(
        adapter.handle(Some(&session_id), None, raw.as_bytes()).await,
        Reply::Ack
    ));

    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    match next_frame(&mut frames).await {
        OutboundFrame::Event(event) => {
            assert_eq!(event.id, 1);
            assert_eq!(event.payload["result"]["data"]["text"], "quiet");
        }
        other => panic!("expected event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_last_event_id_is_rejected() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    drop(connection);

    let raw = json!({ "jsonrpc": "2.0", "id": 4, "method": "session/resume" }).to_string();
    match adapter.handle(Some(&session_id), Some("abc"), raw.as_bytes()).await {
        Reply::Error(error) => {
            assert_eq!(error.code(), codes::INVALID_PARAMS);
            assert_eq!(error.id, json!(4));
        }
        _ => panic!("expected invalid params"),
    }

    // The session was not touched
    let session = adapter.registry().resume(&session_id).unwrap();
    assert_eq!(session.state, ConnectionState::Draining);
}

#[tokio::test]
async fn test_new_connection_supersedes_old_one() {
    let adapter = setup_adapter(100);
    let first = adapter.open(json!(1)).unwrap();
    let session_id = first.session().session_id.clone();
    let mut first_frames = Box::pin(first.into_frames());
    next_frame(&mut first_frames).await;

    let second = adapter.resume(json!(2), &session_id, None).unwrap();
    assert!(first_frames.next().await.is_none());
    drop(first_frames);

    // The stale connection must not drain the session
    let session = adapter.registry().resume(&session_id).unwrap();
    assert_eq!(session.state, ConnectionState::Active);

    echo(&adapter, &session_id, "x").await;
    let mut frames = Box::pin(second.into_frames());
    next_frame(&mut frames).await;
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(1));
}

#[tokio::test]
async fn test_collaborator_timeout_keeps_session_active() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    let delivery = adapter
        .call(
            &session_id,
            json!(7),
            "contact_enrich".to_string(),
            json!({ "email": "jane@example.com" }),
        )
        .await
        .unwrap();

    let payload = &delivery.event().unwrap().payload;
    assert_eq!(payload["result"]["success"], false);
    assert!(payload["result"]["error"]
        .as_str()
        .unwrap()
        .contains("timed out"));

    let session = adapter.registry().resume(&session_id).unwrap();
    assert_eq!(session.state, ConnectionState::Active);
    drop(connection);
}

#[tokio::test]
async fn test_tool_failures_come_back_as_call_results() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    let unknown = adapter
        .call(&session_id, json!(1), "missing".to_string(), json!({}))
        .await
        .unwrap();
    assert_eq!(
        unknown.event().unwrap().payload["result"]["error"],
        "Unknown tool: missing"
    );

    let invalid = adapter
        .call(&session_id, json!(2), "echo".to_string(), json!({ "text": 5 }))
        .await
        .unwrap();
    let error = invalid.event().unwrap().payload["result"]["error"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(error.starts_with("Invalid arguments for echo"));
    drop(connection);
}

#[tokio::test]
async fn test_malformed_frame_leaves_session_usable() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();

    match adapter.handle(Some(&session_id), None, b"{not json").await {
        Reply::Error(error) => assert_eq!(error.code(), codes::PARSE_ERROR),
        _ => panic!("expected parse error"),
    }

    let raw = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "echo", "arguments": { "text": "still here" } }
    })
    .to_string();
    match adapter.handle(Some(&session_id), None, raw.as_bytes()).await {
        Reply::Accepted(body) => {
            assert_eq!(body["result"]["eventId"], 1);
            assert_eq!(body["result"]["delivery"], "live");
        }
        _ => panic!("expected accepted call"),
    }
    drop(connection);
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let adapter = setup_adapter(100);

    let err = adapter
        .call("sess_missing", json!(1), "echo".to_string(), json!({ "text": "x" }))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::Session(SessionError::NotFound("sess_missing".to_string()))
    );
    assert_eq!(err.to_jsonrpc(json!(1)).code(), codes::SESSION_NOT_FOUND);

    assert!(adapter.resume(json!(2), "sess_missing", Some(0)).is_err());
}

#[tokio::test]
async fn test_closed_session_cannot_be_reactivated() {
    let adapter = setup_adapter(100);
    let connection = adapter.open(json!(1)).unwrap();
    let session_id = connection.session().session_id.clone();
    echo(&adapter, &session_id, "a").await;

    let closed = adapter.close(&session_id).unwrap();
    assert_eq!(closed.state, ConnectionState::Closed);
    assert!(adapter.registry().log().retained(&closed.stream_id).is_empty());

    // Already delivered events drain out, then the stream ends
    let mut frames = Box::pin(connection.into_frames());
    next_frame(&mut frames).await;
    assert_eq!(next_frame(&mut frames).await.event_id(), Some(1));
    assert!(frames.next().await.is_none());

    match adapter.resume(json!(2), &session_id, Some(0)) {
        Err(ProtocolError::Session(SessionError::InvalidStateTransition { from, to, .. })) => {
            assert_eq!(from, ConnectionState::Closed);
            assert_eq!(to, ConnectionState::Active);
        }
        _ => panic!("expected invalid transition"),
    }

    let err = adapter
        .call(&session_id, json!(3), "echo".to_string(), json!({ "text": "b" }))
        .await
        .unwrap_err();
    assert_eq!(err.to_jsonrpc(json!(3)).code(), codes::INVALID_SESSION_STATE);
}
