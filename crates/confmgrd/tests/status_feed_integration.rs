//! Integration tests for the status feed socket.
//!
//! These run on the real clock against a socket in a temp directory.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::{registry_for, wait_until, Script};
use confmgr_core::{ClientName, DaemonStatus, StatusEvent};
use confmgrd::status_feed::{FeedError, StatusFeedServer};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

fn start_feed(
    socket: &Path,
    events: mpsc::Sender<StatusEvent>,
    cancel: &CancellationToken,
) -> JoinHandle<Result<(), FeedError>> {
    let server = StatusFeedServer::new(socket, events, cancel.clone());
    tokio::spawn(async move { server.run().await })
}

async fn connect(socket: &Path) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(socket).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("status feed did not start listening at {}", socket.display());
}

async fn next_event(rx: &mut mpsc::Receiver<StatusEvent>) -> StatusEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for status event")
        .expect("event channel closed")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_lines_become_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(16);
    let server = start_feed(&socket, tx, &cancel);

    let mut stream = connect(&socket).await;
    stream
        .write_all(
            b"{\"name\": \"bgpd\", \"status\": \"stopped\"}\n\
              \n\
              {\"Name\": \"bgpd\", \"Status\": \"up\"}\n",
        )
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        StatusEvent::new("bgpd", DaemonStatus::Stopped)
    );
    assert_eq!(
        next_event(&mut rx).await,
        StatusEvent::new("bgpd", DaemonStatus::Up)
    );

    cancel.cancel();
    timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!socket.exists(), "socket removed on shutdown");
}

#[tokio::test]
async fn test_bad_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(16);
    let _server = start_feed(&socket, tx, &cancel);

    let mut stream = connect(&socket).await;
    stream
        .write_all(
            b"not json at all\n\
              {\"name\": \"vland\", \"status\": \"exploded\"}\n\
              {\"name\": \"\", \"status\": \"up\"}\n\
              {\"name\": \"vland\", \"status\": \"restarting\"}\n",
        )
        .await
        .unwrap();

    assert_eq!(
        next_event(&mut rx).await,
        StatusEvent::new("vland", DaemonStatus::Restarting)
    );
    cancel.cancel();
}

#[tokio::test]
async fn test_multiple_connections() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(16);
    let _server = start_feed(&socket, tx, &cancel);

    let mut first = connect(&socket).await;
    let mut second = connect(&socket).await;
    first
        .write_all(b"{\"name\": \"bgpd\", \"status\": \"up\"}\n")
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.name, ClientName::new("bgpd"));

    second
        .write_all(b"{\"name\": \"vland\", \"status\": \"up\"}\n")
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.name, ClientName::new("vland"));

    cancel.cancel();
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    std::fs::write(&socket, b"stale").unwrap();

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(4);
    let _server = start_feed(&socket, tx, &cancel);

    let mut stream = connect(&socket).await;
    stream
        .write_all(b"{\"name\": \"ribd\", \"status\": \"up\"}\n")
        .await
        .unwrap();
    assert_eq!(next_event(&mut rx).await.name, ClientName::new("ribd"));

    cancel.cancel();
}

#[tokio::test]
async fn test_feed_stops_when_consumer_goes_away() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(4);
    let server = start_feed(&socket, tx, &cancel);

    connect(&socket).await;
    drop(rx);

    timeout(Duration::from_secs(2), server)
        .await
        .expect("feed should stop once the receiver is dropped")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_feed_drives_registry_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("status.sock");
    let cancel = CancellationToken::new();

    let bgpd = Script::connectable();
    let registry = Arc::new(registry_for(&[("bgpd", &bgpd)]));
    let handle = Arc::clone(registry.get("bgpd").unwrap());
    handle.connect().await;

    let (tx, rx) = mpsc::channel(16);
    let _server = start_feed(&socket, tx, &cancel);
    {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.listen_to_status_changes(rx).await });
    }

    let mut stream = connect(&socket).await;
    stream
        .write_all(b"{\"name\": \"bgpd\", \"status\": \"stopped\"}\n")
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || !handle.is_connected()).await);

    stream
        .write_all(b"{\"name\": \"bgpd\", \"status\": \"up\"}\n")
        .await
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || handle.is_connected()).await);

    assert_eq!(bgpd.disconnect_calls(), 1);
    cancel.cancel();
}
