//! End-to-end relay assembly: stored credential, Helix over HTTP, and a
//! scripted websocket peer.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use modrelay::adapters::{FileCredentialsProvider, MockConnector, MockPeer, RecordingReviewSink};
use modrelay::error::RelayError;
use modrelay::eventsub::{SessionState, SessionStatus, SubscriptionState};
use modrelay::startup::{self, ConfigError, Relay, RelayConfig};
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    _dir: TempDir,
    relay: Relay,
    connector: MockConnector,
    peers: mpsc::UnboundedReceiver<MockPeer>,
    sink: RecordingReviewSink,
}

fn config(server: &MockServer, tokens: &Path) -> RelayConfig {
    RelayConfig::new(CLIENT_ID, "streamer")
        .with_tokens_path(tokens)
        .with_identity_url(server.uri())
        .with_helix_url(format!("{}/helix", server.uri()))
        .with_eventsub_url("wss://eventsub.test/ws")
        .with_validation_period(Duration::from_secs(3600))
}

async fn mount_user(server: &MockServer, login: &str, id: &str, created_at: &str) {
    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .and(query_param("login", login))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(id, login, created_at)))
        .mount(server)
        .await;
}

async fn mount_subscription_for(server: &MockServer, session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/helix/eventsub/subscriptions"))
        .and(body_partial_json(serde_json::json!({
            "type": "channel.chat.message",
            "condition": {
                "broadcaster_user_id": BROADCASTER_ID,
                "user_id": MODERATOR_ID,
            },
            "transport": { "method": "websocket", "session_id": session_id },
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "data": [{
                "id": format!("sub-{}", session_id),
                "status": "enabled",
                "type": "channel.chat.message",
                "version": "1",
            }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn harness(server: &MockServer) -> Harness {
    let dir = TempDir::new().unwrap();
    let tokens = dir.path().join("tokens.json");
    seed_credential(&tokens, &test_credential());

    mount_validate_ok(server).await;
    mount_user(server, "streamer", BROADCASTER_ID, "2015-01-01T00:00:00Z").await;
    let young = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    mount_user(server, "newbie", "id-newbie", &young).await;
    mount_user(server, "veteran", "id-veteran", "2016-06-01T00:00:00Z").await;

    let (connector, peers) = MockConnector::new();
    let sink = RecordingReviewSink::new();
    let relay = startup::start(
        &config(server, &tokens),
        http(),
        Arc::new(FileCredentialsProvider::with_path(&tokens)),
        Arc::new(connector.clone()),
        sink.clone(),
    )
    .await
    .unwrap();

    Harness {
        _dir: dir,
        relay,
        connector,
        peers,
        sink,
    }
}

async fn wait_status(
    status: &mut watch::Receiver<SessionStatus>,
    pred: impl Fn(&SessionStatus) -> bool,
) -> SessionStatus {
    tokio::time::timeout(WAIT, async {
        loop {
            let current = status.borrow_and_update().clone();
            if pred(&current) {
                return current;
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MockPeer>) -> MockPeer {
    tokio::time::timeout(WAIT, peers.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_start_resolves_accounts() {
    let server = MockServer::start().await;
    let h = harness(&server).await;

    assert_eq!(h.relay.broadcaster.id, BROADCASTER_ID);
    assert_eq!(h.relay.broadcaster.login, "streamer");
    assert_eq!(h.relay.moderator_id, MODERATOR_ID);
    assert!(h.connector.attempts().is_empty());

    h.relay.validator.abort();
}

#[tokio::test]
async fn test_young_accounts_reach_review() {
    let server = MockServer::start().await;
    mount_subscription_for(&server, "s1").await;
    let mut h = harness(&server).await;

    let mut status = h.relay.manager.status();
    let shutdown = h.relay.manager.shutdown_handle();
    let task = tokio::spawn(h.relay.manager.run());

    let peer = next_peer(&mut h.peers).await;
    assert_eq!(peer.url, "wss://eventsub.test/ws");
    peer.send_text(frames::welcome("s1", 10));
    let active = wait_status(&mut status, |s| s.state == SessionState::Active).await;
    assert_eq!(active.session_id.as_deref(), Some("s1"));
    assert_eq!(active.subscription, SubscriptionState::Active);

    peer.send_text(frames::chat_message("m-1", "veteran", "hello all"));
    peer.send_text(frames::chat_message("m-2", "newbie", "buy followers"));
    // Redelivery of the same message id.
    peer.send_text(frames::chat_message("m-2", "newbie", "buy followers"));
    peer.send_text(frames::chat_message("m-3", "newbie", "cheap"));

    let events = tokio::time::timeout(WAIT, h.sink.wait_for_count(2))
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].message_id, "m-2");
    assert_eq!(events[0].chatter_login, "newbie");
    assert_eq!(events[0].text, "buy followers");
    assert_eq!(events[0].broadcaster_id, BROADCASTER_ID);
    assert_eq!(events[1].message_id, "m-3");

    shutdown.shutdown();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert!(peer.is_closed_by_client());
    assert_eq!(status.borrow().state, SessionState::Closed);
    h.relay.validator.abort();
}

#[tokio::test]
async fn test_reconnect_moves_subscription_to_new_session() {
    let server = MockServer::start().await;
    mount_subscription_for(&server, "s1").await;
    mount_subscription_for(&server, "s2").await;
    let mut h = harness(&server).await;

    let mut status = h.relay.manager.status();
    let shutdown = h.relay.manager.shutdown_handle();
    let task = tokio::spawn(h.relay.manager.run());

    let first = next_peer(&mut h.peers).await;
    first.send_text(frames::welcome("s1", 10));
    wait_status(&mut status, |s| s.state == SessionState::Active).await;

    first.send_text(frames::reconnect("s1", "wss://eventsub.test/ws?id=next"));
    let second = next_peer(&mut h.peers).await;
    assert_eq!(second.url, "wss://eventsub.test/ws?id=next");

    // The old connection keeps delivering until the new one is welcomed.
    first.send_text(frames::chat_message("m-1", "newbie", "still here"));
    h.sink.wait_for_count(1).await;

    second.send_text(frames::welcome("s2", 10));
    let migrated = wait_status(&mut status, |s| {
        s.session_id.as_deref() == Some("s2") && s.subscription == SubscriptionState::Active
    })
    .await;
    assert_eq!(migrated.state, SessionState::Active);
    tokio::time::timeout(WAIT, first.wait_closed()).await.unwrap();

    second.send_text(frames::chat_message("m-2", "newbie", "moved"));
    let events = tokio::time::timeout(WAIT, h.sink.wait_for_count(2))
        .await
        .unwrap();
    assert_eq!(events[1].text, "moved");

    shutdown.shutdown();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    h.relay.validator.abort();
}

#[tokio::test]
async fn test_unknown_broadcaster_fails_startup() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let tokens = dir.path().join("tokens.json");
    seed_credential(&tokens, &test_credential());

    mount_validate_ok(&server).await;
    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
        .mount(&server)
        .await;

    let (connector, _peers) = MockConnector::new();
    let result = startup::start(
        &config(&server, &tokens),
        http(),
        Arc::new(FileCredentialsProvider::with_path(&tokens)),
        Arc::new(connector),
        RecordingReviewSink::new(),
    )
    .await;

    match result {
        Err(RelayError::Config(ConfigError::Invalid { name, .. })) => {
            assert_eq!(name, "BROADCASTER_LOGIN")
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("startup should fail"),
    }
}
