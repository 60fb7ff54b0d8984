//! Credential bootstrap.
//!
//! A stored credential is preferred: it is loaded and validated (which
//! refreshes it if the provider rejects it). When there is none, or it can
//! no longer be refreshed, the device authorization grant runs.

use tracing::{info, warn};

use crate::auth::CredentialStore;
use crate::error::AuthError;

/// Make `store` hold a usable credential and return the account id it
/// belongs to.
pub async fn bootstrap_credential(store: &CredentialStore) -> Result<String, AuthError> {
    let loaded = match store.load().await {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(error = %e, "Could not read stored credential");
            false
        }
    };

    if loaded {
        match store.validate().await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                warn!(error = %e, code = e.error_code(), "Stored credential unusable, authorizing again");
                return acquire(store).await;
            }
            // The provider could not answer. Keep the stored token; the
            // periodic validation will look at it again.
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Could not validate stored credential");
            }
        }

        if let Some(user_id) = store.user_id().await {
            info!(user_id = %user_id, "Using stored credential");
            return Ok(user_id);
        }
        warn!("Stored credential has no account id, authorizing again");
    } else {
        info!("No stored credential, starting device authorization");
    }

    acquire(store).await
}

async fn acquire(store: &CredentialStore) -> Result<String, AuthError> {
    let user = store.acquire().await?;
    Ok(user.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemoryCredentials, MockHttpClient, MockResponse};
    use crate::auth::{Credential, IdentityApiClient};
    use crate::helix::HelixApi;
    use crate::traits::HttpClient;
    use std::sync::Arc;
    use std::time::Duration;

    const ID: &str = "https://id.test";

    fn store(http: &MockHttpClient, provider: InMemoryCredentials) -> CredentialStore {
        let shared: Arc<dyn HttpClient> = Arc::new(http.clone());
        let identity = IdentityApiClient::new(shared.clone(), "cid").with_base_url(ID);
        let helix = HelixApi::new(shared, "cid").with_base_url("https://api.test/helix");
        CredentialStore::new(identity, helix, Arc::new(provider))
            .with_poll_interval(Duration::from_secs(1))
    }

    fn stored() -> Credential {
        Credential {
            access_token: Some("tok".to_string()),
            refresh_token: Some("refresh".to_string()),
            user_id: Some("200".to_string()),
            ..Default::default()
        }
    }

    fn device_flow_ok(http: &MockHttpClient) {
        http.set_response(
            &format!("{}/oauth2/device", ID),
            MockResponse::status(
                200,
                r#"{"device_code":"dc","user_code":"ABCD","verification_uri":"https://www.twitch.tv/activate","expires_in":1800,"interval":1}"#,
            ),
        );
        http.set_response(
            &format!("{}/oauth2/token", ID),
            MockResponse::status(200, r#"{"access_token":"new","refresh_token":"r"}"#),
        );
        http.set_response(
            "https://api.test/helix/users",
            MockResponse::status(
                200,
                r#"{"data":[{"id":"777","login":"mod","display_name":"Mod","created_at":"2020-01-01T00:00:00Z"}]}"#,
            ),
        );
    }

    #[tokio::test]
    async fn test_valid_stored_credential_is_used() {
        let http = MockHttpClient::new();
        http.set_response(
            &format!("{}/oauth2/validate", ID),
            MockResponse::status(200, r#"{"client_id":"cid","login":"mod","user_id":"200","expires_in":3600}"#),
        );
        let provider = InMemoryCredentials::with_credential(stored());

        let user_id = bootstrap_credential(&store(&http, provider)).await.unwrap();
        assert_eq!(user_id, "200");
        assert_eq!(http.count_requests("POST", &format!("{}/oauth2/device", ID)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_stored_credential_runs_device_flow() {
        let http = MockHttpClient::new();
        device_flow_ok(&http);
        let provider = InMemoryCredentials::new();

        let user_id = bootstrap_credential(&store(&http, provider.clone())).await.unwrap();
        assert_eq!(user_id, "777");
        assert_eq!(provider.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrefreshable_credential_falls_back_to_device_flow() {
        let http = MockHttpClient::new();
        device_flow_ok(&http);
        http.set_response(&format!("{}/oauth2/validate", ID), MockResponse::status(401, "{}"));
        let provider = InMemoryCredentials::with_credential(Credential {
            refresh_token: None,
            ..stored()
        });

        let user_id = bootstrap_credential(&store(&http, provider)).await.unwrap();
        assert_eq!(user_id, "777");
    }

    #[tokio::test]
    async fn test_validation_outage_keeps_stored_credential() {
        let http = MockHttpClient::new();
        http.set_response(&format!("{}/oauth2/validate", ID), MockResponse::status(503, "{}"));
        let provider = InMemoryCredentials::with_credential(stored());

        let user_id = bootstrap_credential(&store(&http, provider)).await.unwrap();
        assert_eq!(user_id, "200");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_record_is_replaced_by_device_flow() {
        let http = MockHttpClient::new();
        device_flow_ok(&http);
        let provider = InMemoryCredentials::with_credential(stored());
        provider.set_load_should_fail(true);

        let user_id = bootstrap_credential(&store(&http, provider.clone())).await.unwrap();
        assert_eq!(user_id, "777");
        assert_eq!(http.count_requests("GET", &format!("{}/oauth2/validate", ID)), 0);
        assert_eq!(provider.save_count(), 1);
        assert_eq!(
            provider.get_credential().and_then(|c| c.access_token),
            Some("new".to_string())
        );
    }
}
