//! Integration tests for the connection registry and fan-out.
//!
//! These tests drive `Streamer` directly, reading each connection's outbox
//! the way a dispatch loop would.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use streamer_core::{ConnectionId, Message};
use streamerd::config::StreamerOptions;
use streamerd::registry::{Connection, Streamer, StreamerError};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

async fn running_streamer() -> Streamer {
    let streamer = Streamer::new(StreamerOptions::default());
    streamer.start().await;
    streamer
}

/// Receives the next message or fails the test.
async fn expect_message(conn: &mut Connection) -> Arc<Message> {
    timeout(RECV_TIMEOUT, conn.recv())
        .await
        .expect("timed out waiting for message")
        .expect("outbox closed unexpectedly")
}

/// Asserts that nothing is queued for the connection.
fn expect_nothing(conn: &mut Connection) {
    match conn.try_recv() {
        Err(TryRecvError::Empty) => {}
        other => panic!("expected empty outbox, got {other:?}"),
    }
}

// ============================================================================
// Addressing Tests
// ============================================================================

#[tokio::test]
async fn test_unicast_reaches_only_target() {
    let streamer = running_streamer().await;
    let mut target = streamer.register("alice").await.unwrap();
    let mut same_user = streamer.register("alice").await.unwrap();
    let mut other = streamer.register("bob").await.unwrap();

    let delivered = streamer.unicast("note", "hi", target.id()).await.unwrap();
    assert_eq!(delivered, 1);

    let msg = expect_message(&mut target).await;
    assert_eq!(msg.event(), "note");
    assert_eq!(msg.lines(), ["hi"]);
    expect_nothing(&mut same_user);
    expect_nothing(&mut other);
}

#[tokio::test]
async fn test_unicast_unknown_id_is_silent_noop() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("alice").await.unwrap();

    let unknown = ConnectionId::generate().unwrap();
    let result = streamer.unicast("", "hi", unknown).await;

    assert_eq!(result.unwrap(), 0);
    expect_nothing(&mut conn);
}

#[tokio::test]
async fn test_broadcast_reaches_connections_registered_at_call_time() {
    let streamer = running_streamer().await;
    let mut a = streamer.register("alice").await.unwrap();
    let mut b = streamer.register("").await.unwrap();

    assert_eq!(streamer.broadcast("", "first").await.unwrap(), 2);

    let mut late = streamer.register("carol").await.unwrap();

    assert_eq!(expect_message(&mut a).await.lines(), ["first"]);
    assert_eq!(expect_message(&mut b).await.lines(), ["first"]);
    expect_nothing(&mut late);
}

#[tokio::test]
async fn test_multicast_duplicate_keys_deliver_once_per_connection() {
    let streamer = running_streamer().await;
    let mut a1 = streamer.register("alice").await.unwrap();
    let mut a2 = streamer.register("alice").await.unwrap();
    let mut b = streamer.register("bob").await.unwrap();
    let mut c = streamer.register("carol").await.unwrap();

    let delivered = streamer
        .multicast("", "hey", &["alice", "bob", "alice", "alice"])
        .await
        .unwrap();
    assert_eq!(delivered, 3);

    for conn in [&mut a1, &mut a2, &mut b] {
        assert_eq!(expect_message(conn).await.lines(), ["hey"]);
        expect_nothing(conn);
    }
    expect_nothing(&mut c);
}

#[tokio::test]
async fn test_multicast_unknown_user_delivers_nothing() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("alice").await.unwrap();

    let delivered = streamer.multicast("", "x", &["nobody"]).await.unwrap();
    assert_eq!(delivered, 0);
    expect_nothing(&mut conn);
}

#[tokio::test]
async fn test_multi_line_data_is_split() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("").await.unwrap();

    streamer.broadcast("log", "line one\nline two").await.unwrap();

    let msg = expect_message(&mut conn).await;
    assert_eq!(msg.lines(), ["line one", "line two"]);
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("").await.unwrap();

    for i in 0..10 {
        streamer.broadcast("", &i.to_string()).await.unwrap();
    }
    for i in 0..10 {
        assert_eq!(expect_message(&mut conn).await.lines(), [i.to_string()]);
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_operations_fail_before_start() {
    let streamer = Streamer::new(StreamerOptions::default());

    assert!(matches!(
        streamer.register("alice").await,
        Err(StreamerError::StreamerStopped)
    ));
    assert!(matches!(
        streamer.broadcast("", "x").await,
        Err(StreamerError::StreamerStopped)
    ));
}

#[tokio::test]
async fn test_everything_fails_after_stop() {
    let streamer = running_streamer().await;
    let conn = streamer.register("alice").await.unwrap();
    streamer.stop().await;

    assert!(!streamer.is_running().await);
    assert!(matches!(
        streamer.register("alice").await,
        Err(StreamerError::StreamerStopped)
    ));
    assert!(matches!(
        streamer.broadcast("", "x").await,
        Err(StreamerError::StreamerStopped)
    ));
    assert!(matches!(
        streamer.multicast("", "x", &["alice"]).await,
        Err(StreamerError::StreamerStopped)
    ));
    assert!(matches!(
        streamer.unicast("", "x", conn.id()).await,
        Err(StreamerError::StreamerStopped)
    ));
}

#[tokio::test]
async fn test_same_user_multicast_then_stop_closes_both() {
    let streamer = running_streamer().await;
    let mut a = streamer.register("alice").await.unwrap();
    let mut b = streamer.register("alice").await.unwrap();
    assert_eq!(streamer.user_connection_count("alice").await, 2);

    assert_eq!(streamer.multicast("", "both", &["alice"]).await.unwrap(), 2);
    assert_eq!(expect_message(&mut a).await.lines(), ["both"]);
    assert_eq!(expect_message(&mut b).await.lines(), ["both"]);

    streamer.stop().await;

    assert!(a.recv().await.is_none(), "outbox a closed");
    assert!(b.recv().await.is_none(), "outbox b closed");
    assert_eq!(streamer.connection_count().await, 0);
    assert_eq!(streamer.user_connection_count("alice").await, 0);
}

#[tokio::test]
async fn test_stop_delivers_already_queued_messages_before_close() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("").await.unwrap();

    streamer.broadcast("", "queued").await.unwrap();
    streamer.stop().await;

    assert_eq!(expect_message(&mut conn).await.lines(), ["queued"]);
    assert!(conn.recv().await.is_none());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let streamer = running_streamer().await;
    streamer.stop().await;
    streamer.start().await;

    let mut conn = streamer.register("alice").await.unwrap();
    streamer.broadcast("", "again").await.unwrap();
    assert_eq!(expect_message(&mut conn).await.lines(), ["again"]);
}

#[tokio::test]
async fn test_deregistered_connection_is_unreachable() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("alice").await.unwrap();

    assert!(streamer.deregister(&conn).await);

    assert_eq!(streamer.unicast("", "x", conn.id()).await.unwrap(), 0);
    assert_eq!(streamer.multicast("", "x", &["alice"]).await.unwrap(), 0);
    assert_eq!(streamer.broadcast("", "x").await.unwrap(), 0);
    assert!(
        !matches!(conn.try_recv(), Ok(_)),
        "nothing may be queued after deregistration"
    );
}

#[tokio::test]
async fn test_independent_streamers_share_nothing() {
    let first = running_streamer().await;
    let second = running_streamer().await;
    let mut a = first.register("alice").await.unwrap();
    let mut b = second.register("alice").await.unwrap();

    first.broadcast("", "only first").await.unwrap();
    second.stop().await;

    assert_eq!(expect_message(&mut a).await.lines(), ["only first"]);
    assert!(b.recv().await.is_none());
    assert!(first.is_running().await);
}

#[tokio::test]
async fn test_connection_ids_are_unique() {
    let streamer = running_streamer().await;
    let mut ids = std::collections::HashSet::new();
    let mut conns = Vec::new();
    for _ in 0..100 {
        let conn = streamer.register("alice").await.unwrap();
        assert!(ids.insert(conn.id()));
        assert_eq!(conn.user_key(), "alice");
        conns.push(conn);
    }
    assert_eq!(streamer.connection_count().await, 100);
}

// ============================================================================
// JSON Convenience Tests
// ============================================================================

#[tokio::test]
async fn test_json_variants_serialize_payload() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("alice").await.unwrap();

    streamer
        .broadcast_json("b", &serde_json::json!({"n": 1}))
        .await
        .unwrap();
    streamer
        .multicast_json("m", &vec!["x", "y"], &["alice"])
        .await
        .unwrap();
    streamer.unicast_json("u", "text", conn.id()).await.unwrap();

    assert_eq!(expect_message(&mut conn).await.lines(), [r#"{"n":1}"#]);
    assert_eq!(expect_message(&mut conn).await.lines(), [r#"["x","y"]"#]);
    assert_eq!(expect_message(&mut conn).await.lines(), [r#""text""#]);
}

#[tokio::test]
async fn test_json_serialization_failure_sends_nothing() {
    let streamer = running_streamer().await;
    let mut conn = streamer.register("alice").await.unwrap();

    // JSON object keys must be strings.
    let mut bad = HashMap::new();
    bad.insert((1, 2), "value");

    let result = streamer.broadcast_json("", &bad).await;
    assert!(matches!(result, Err(StreamerError::SerializationFailed(_))));
    expect_nothing(&mut conn);
}

// ============================================================================
// Backpressure Tests
// ============================================================================

#[tokio::test]
async fn test_full_outbox_blocks_sender_until_drained() {
    let streamer = Arc::new(Streamer::new(
        StreamerOptions::default().with_queue_depth(1),
    ));
    streamer.start().await;
    let mut conn = streamer.register("").await.unwrap();

    streamer.broadcast("", "one").await.unwrap();

    let sender = Arc::clone(&streamer);
    let mut second = tokio::spawn(async move { sender.broadcast("", "two").await });

    assert!(
        timeout(Duration::from_millis(50), &mut second).await.is_err(),
        "second send should block on the full outbox"
    );

    assert_eq!(expect_message(&mut conn).await.lines(), ["one"]);
    let delivered = timeout(RECV_TIMEOUT, second)
        .await
        .expect("send should resume after drain")
        .unwrap()
        .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(expect_message(&mut conn).await.lines(), ["two"]);
}

#[tokio::test]
async fn test_send_to_dropped_connection_does_not_block() {
    let streamer = Streamer::new(StreamerOptions::default().with_queue_depth(1));
    streamer.start().await;
    let conn = streamer.register("").await.unwrap();
    let id = conn.id();

    // The dispatch loop is gone but the connection was never deregistered.
    drop(conn);

    for _ in 0..3 {
        let delivered = timeout(RECV_TIMEOUT, streamer.unicast("", "x", id))
            .await
            .expect("send to a dropped outbox must not block")
            .unwrap();
        assert_eq!(delivered, 0);
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_under_concurrent_fan_out() {
    let streamer = Arc::new(Streamer::new(
        StreamerOptions::default().with_queue_depth(4),
    ));
    streamer.start().await;

    // Readers keep draining until their outbox closes.
    let mut readers = Vec::new();
    for i in 0..8 {
        let mut conn = streamer.register(format!("user-{}", i % 3)).await.unwrap();
        readers.push(tokio::spawn(async move {
            let mut received = 0usize;
            while conn.recv().await.is_some() {
                received += 1;
            }
            received
        }));
    }

    let mut producers = Vec::new();
    for p in 0..8 {
        let streamer = Arc::clone(&streamer);
        producers.push(tokio::spawn(async move {
            let mut ok = 0usize;
            for n in 0..200 {
                let result = match n % 3 {
                    0 => streamer.broadcast("", "b").await,
                    1 => streamer.multicast("", "m", &[format!("user-{}", p % 3)]).await,
                    _ => streamer.register("late").await.map(|_| 0),
                };
                match result {
                    Ok(_) => ok += 1,
                    Err(StreamerError::StreamerStopped) => break,
                    Err(e) => panic!("unexpected error: {e}"),
                }
                tokio::task::yield_now().await;
            }
            ok
        }));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    timeout(Duration::from_secs(5), streamer.stop())
        .await
        .expect("stop should quiesce");

    for producer in producers {
        producer.await.expect("producer must not panic");
    }
    for reader in readers {
        timeout(Duration::from_secs(5), reader)
            .await
            .expect("reader should see its outbox close")
            .expect("reader must not panic");
    }
    assert_eq!(streamer.connection_count().await, 0);
}
