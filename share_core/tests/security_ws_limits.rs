mod common;

use common::{TestServer, next_event, send_event, test_config};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use share_core::ServerConfig;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_max_concurrent_connections() {
    let server = TestServer::start(ServerConfig {
        max_connections: 2,
        ..test_config()
    })
    .await;

    let (_first, _) = server.connect_peer().await;
    let (_second, _) = server.connect_peer().await;

    let mut third = server.connect().await;
    let msg = tokio::time::timeout(Duration::from_secs(2), third.next())
        .await
        .expect("rejection should be immediate");
    match msg {
        Some(Ok(Message::Text(text))) => {
            assert!(text.as_str().contains("Too many concurrent connections"))
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert_eq!(server.hub.peers.len().await, 2);
}

#[tokio::test]
async fn test_slot_freed_after_disconnect() {
    let server = TestServer::start(ServerConfig {
        max_connections: 1,
        ..test_config()
    })
    .await;

    let (mut first, _) = server.connect_peer().await;
    first.close(None).await.unwrap();

    // Wait for the server side to finish cleanup
    for _ in 0..50 {
        if server.hub.peers.len().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (_second, _) = server.connect_peer().await;
}

#[tokio::test]
async fn test_malformed_events_keep_connection_open() {
    let server = TestServer::start(test_config()).await;
    let (mut client, _) = server.connect_peer().await;

    for event in [
        json!("just a string"),
        json!({"type": "launch-rockets"}),
        json!({"type": "webrtc-offer", "offer": {}}),
        json!({"type": "request-file", "code": ""}),
    ] {
        send_event(&mut client, event).await;
        let err = next_event(&mut client).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["kind"], "malformed_request");
    }

    client
        .send(Message::Binary(vec![0u8, 1, 2].into()))
        .await
        .unwrap();
    let err = next_event(&mut client).await;
    assert_eq!(err["kind"], "malformed_request");

    send_event(&mut client, json!({"type": "discover-peers"})).await;
    let list = next_event(&mut client).await;
    assert_eq!(list["type"], "peers-list");
    assert_eq!(list["peers"], json!([]));
}
