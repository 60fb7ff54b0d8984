//! Common test utilities for integration tests.
//!
//! Builds the relay's components against a `wiremock` server standing in
//! for both the identity service and Helix, and provides websocket frames
//! shaped like the provider's.

#![allow(dead_code)]

pub mod frames;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use modrelay::adapters::{FileCredentialsProvider, ReqwestHttpClient};
use modrelay::auth::{Credential, CredentialStore, IdentityApiClient};
use modrelay::helix::{HelixApi, HelixClient};
use modrelay::traits::{CredentialsProvider, HttpClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client id every helper configures.
pub const CLIENT_ID: &str = "test-client-id";
/// Account id of the moderator credential.
pub const MODERATOR_ID: &str = "200";
pub const BROADCASTER_ID: &str = "100";

/// A stored credential for the moderator account.
pub fn test_credential() -> Credential {
    Credential {
        access_token: Some("stale-access-token".to_string()),
        refresh_token: Some("refresh-token-1".to_string()),
        user_id: Some(MODERATOR_ID.to_string()),
        ..Default::default()
    }
}

pub fn http() -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new())
}

pub fn identity(server: &MockServer) -> IdentityApiClient {
    IdentityApiClient::new(http(), CLIENT_ID).with_base_url(server.uri())
}

pub fn helix_api(server: &MockServer) -> HelixApi {
    HelixApi::new(http(), CLIENT_ID).with_base_url(format!("{}/helix", server.uri()))
}

/// Credential store persisting to `tokens` and talking to `server`.
pub fn file_store(server: &MockServer, tokens: &Path) -> CredentialStore {
    let provider: Arc<dyn CredentialsProvider> =
        Arc::new(FileCredentialsProvider::with_path(tokens));
    CredentialStore::new(identity(server), helix_api(server), provider)
        .with_poll_interval(Duration::from_millis(10))
}

pub fn helix_client(server: &MockServer, store: Arc<CredentialStore>) -> HelixClient {
    HelixClient::new(helix_api(server), store)
}

/// Write `credential` where a [`FileCredentialsProvider`] will find it.
pub fn seed_credential(tokens: &Path, credential: &Credential) {
    modrelay::auth::CredentialsManager::with_path(tokens)
        .save(credential)
        .unwrap();
}

pub fn user_json(id: &str, login: &str, created_at: &str) -> serde_json::Value {
    serde_json::json!({
        "data": [{
            "id": id,
            "login": login,
            "display_name": login,
            "created_at": created_at,
        }]
    })
}

/// Mount a successful token refresh returning `access_token`.
pub async fn mount_refresh(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access_token,
            "refresh_token": "refresh-token-2",
            "expires_in": 14400,
            "scope": ["moderator:manage:banned_users"],
            "token_type": "bearer",
        })))
        .mount(server)
        .await;
}

/// Mount a validate endpoint accepting every token.
pub async fn mount_validate_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/oauth2/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "client_id": CLIENT_ID,
            "login": "moderator",
            "user_id": MODERATOR_ID,
            "scopes": [],
            "expires_in": 5000,
        })))
        .mount(server)
        .await;
}

/// Mount a subscription endpoint accepting every request.
pub async fn mount_subscriptions_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/helix/eventsub/subscriptions"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "data": [{
                "id": "sub-1",
                "status": "enabled",
                "type": "channel.chat.message",
                "version": "1",
                "cost": 0,
            }],
            "total": 1,
            "total_cost": 0,
            "max_total_cost": 10,
        })))
        .mount(server)
        .await;
}
