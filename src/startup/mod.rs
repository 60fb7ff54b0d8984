//! Startup: configuration and component assembly.
//!
//! Components receive their collaborators as trait objects, so the same
//! assembly runs against real services in the binary and against mocks in
//! tests.
//!
//! # Components
//!
//! - [`config`] - Settings from the environment
//! - [`auth`] - Credential bootstrap (stored credential or device flow)
//!
//! # Usage
//!
//! ```ignore
//! use modrelay::startup::{start, RelayConfig};
//!
//! let config = RelayConfig::from_env()?;
//! let relay = start(&config, http, provider, connector, sink).await?;
//! let result = relay.manager.run().await;
//! ```

pub mod auth;
pub mod config;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::{CredentialStore, IdentityApiClient};
use crate::error::{AuthError, RelayError};
use crate::eventsub::{SessionConfig, SessionManager};
use crate::helix::{HelixApi, HelixClient, HelixUser};
use crate::review::{AccountAgeFilter, ModerationActions};
use crate::traits::{CredentialsProvider, HttpClient, ReviewSink, TransportConnector};

pub use auth::bootstrap_credential;
pub use config::{ConfigError, RelayConfig};

/// Everything the binary runs.
pub struct Relay {
    pub store: Arc<CredentialStore>,
    pub helix: HelixClient,
    pub broadcaster: HelixUser,
    pub moderator_id: String,
    pub actions: ModerationActions,
    pub manager: SessionManager,
    /// Periodic validation. Finishes only with a fatal credential error.
    pub validator: JoinHandle<AuthError>,
}

/// Bootstrap the credential, resolve the broadcaster and assemble the
/// session manager. Chat messages pass the account-age filter before they
/// reach `sink`.
pub async fn start<S: ReviewSink + 'static>(
    config: &RelayConfig,
    http: Arc<dyn HttpClient>,
    provider: Arc<dyn CredentialsProvider>,
    connector: Arc<dyn TransportConnector>,
    sink: S,
) -> Result<Relay, RelayError> {
    let mut identity = IdentityApiClient::new(http.clone(), config.client_id.as_str())
        .with_base_url(config.identity_url.as_str());
    if let Some(secret) = &config.client_secret {
        identity = identity.with_client_secret(secret.as_str());
    }
    let helix_api =
        HelixApi::new(http, config.client_id.as_str()).with_base_url(config.helix_url.as_str());

    let store = Arc::new(
        CredentialStore::new(identity, helix_api.clone(), provider)
            .with_browser_launch(config.open_browser),
    );
    let moderator_id = bootstrap_credential(&store).await?;

    let helix = HelixClient::new(helix_api, store.clone());
    let broadcaster = helix
        .get_user(Some(&config.broadcaster_login))
        .await?
        .ok_or_else(|| ConfigError::Invalid {
            name: "BROADCASTER_LOGIN",
            message: format!("no account named {}", config.broadcaster_login),
        })?;
    info!(
        broadcaster = %broadcaster.login,
        broadcaster_id = %broadcaster.id,
        moderator_id = %moderator_id,
        "Relay configured"
    );

    let filter = AccountAgeFilter::new(sink, Arc::new(helix.clone()), config.min_account_age);
    let manager = SessionManager::new(
        SessionConfig::new(
            config.eventsub_url.as_str(),
            broadcaster.id.as_str(),
            moderator_id.as_str(),
        ),
        connector,
        helix.clone(),
        Arc::new(filter),
    );
    let actions = ModerationActions::new(helix.clone(), broadcaster.id.as_str(), moderator_id.as_str());
    let validator = store.spawn_periodic_validation(config.validation_period);

    Ok(Relay {
        store,
        helix,
        broadcaster,
        moderator_id,
        actions,
        manager,
        validator,
    })
}
