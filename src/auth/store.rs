//! Owner of the privileged credential and its lifecycle.
//!
//! The [`CredentialStore`] is the only place token material lives. Other
//! components ask it for the current access token and ask it to refresh;
//! they never hold tokens of their own.
//!
//! Concurrent refreshes coalesce: callers snapshot a generation counter
//! before queueing on the refresh mutex, and whoever finds the counter moved
//! while it waited takes the outcome of the refresh that just finished
//! instead of issuing another one. A refresh requested because a specific
//! token was rejected is skipped when that token has already been replaced.
//!
//! Every mutation is applied and written out under one persist mutex, so
//! the stored record always matches the latest in-memory credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::credentials::Credential;
use super::identity_api::{DeviceTokenPoll, IdentityApiClient, ValidateOutcome};
use crate::error::AuthError;
use crate::helix::{HelixApi, HelixUser};
use crate::retry::CallOutcome;
use crate::traits::{CredentialsError, CredentialsProvider};

/// Default device-flow polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default period of the scheduled validation.
pub const DEFAULT_VALIDATION_PERIOD: Duration = Duration::from_secs(60 * 60);

/// RFC 8628 §3.5: each `slow_down` widens the polling interval by 5 seconds.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

pub struct CredentialStore {
    credential: RwLock<Credential>,
    /// Outcome of the most recent refresh, guarded by the refresh mutex.
    refresh_lock: Mutex<Option<Result<(), AuthError>>>,
    refresh_generation: AtomicU64,
    persist_lock: Mutex<()>,
    identity: IdentityApiClient,
    helix: HelixApi,
    provider: Arc<dyn CredentialsProvider>,
    poll_interval: Duration,
    open_browser: bool,
}

impl CredentialStore {
    pub fn new(
        identity: IdentityApiClient,
        helix: HelixApi,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            credential: RwLock::new(Credential::new()),
            refresh_lock: Mutex::new(None),
            refresh_generation: AtomicU64::new(0),
            persist_lock: Mutex::new(()),
            identity,
            helix,
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            open_browser: false,
        }
    }

    /// Start from an already known credential instead of an empty one.
    pub fn with_credential(self, credential: Credential) -> Self {
        Self {
            credential: RwLock::new(credential),
            ..self
        }
    }

    /// Device-flow polling interval. The provider's stated interval still
    /// wins when it is longer.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Try to open the verification URI in a browser during [`acquire`](Self::acquire).
    pub fn with_browser_launch(mut self, enabled: bool) -> Self {
        self.open_browser = enabled;
        self
    }

    pub fn client_id(&self) -> &str {
        self.identity.client_id()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.credential.read().await.access_token.clone()
    }

    /// Id of the account the credential belongs to.
    pub async fn user_id(&self) -> Option<String> {
        self.credential.read().await.user_id.clone()
    }

    /// Copy of the current credential.
    pub async fn snapshot(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// Number of refresh exchanges performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_generation.load(Ordering::Acquire)
    }

    /// Load the persisted credential into the store.
    ///
    /// Returns `false` when nothing is stored, which selects the device flow.
    pub async fn load(&self) -> Result<bool, CredentialsError> {
        match self.provider.load().await? {
            Some(credential) if credential.has_token() => {
                *self.credential.write().await = credential;
                Ok(true)
            }
            Some(_) => {
                debug!("Stored credential has no access token, ignoring it");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Obtain a credential with the device authorization grant.
    ///
    /// Logs the verification URI and user code, then polls until the user
    /// approves, the code expires, or the provider refuses. On success the
    /// account id is looked up and the credential is persisted once.
    pub async fn acquire(&self) -> Result<HelixUser, AuthError> {
        let device = self.identity.request_device_code().await?;

        {
            let mut credential = self.credential.write().await;
            credential.device_code = Some(device.device_code.clone());
            credential.user_code = Some(device.user_code.clone());
            credential.verification_uri = Some(device.verification_uri.clone());
        }

        info!(
            verification_uri = %device.verification_uri,
            user_code = %device.user_code,
            "Open {} in a browser and enter {} there",
            device.verification_uri,
            device.user_code
        );
        if self.open_browser {
            if let Err(e) = open::that(&device.verification_uri) {
                debug!(error = %e, "Could not open browser");
            }
        }

        let mut interval = self
            .poll_interval
            .max(Duration::from_secs(device.interval));
        let deadline = Instant::now() + Duration::from_secs(device.expires_in);

        let tokens = loop {
            if Instant::now() >= deadline {
                warn!("Device code expired before authorization completed");
                return Err(AuthError::AuthorizationExpired);
            }

            sleep(interval).await;

            match self.identity.poll_device_token(&device.device_code).await {
                Ok(DeviceTokenPoll::Granted(tokens)) => break tokens,
                Ok(DeviceTokenPoll::Pending) => continue,
                Ok(DeviceTokenPoll::SlowDown) => {
                    interval += SLOW_DOWN_STEP;
                    debug!(interval_secs = interval.as_secs(), "Provider asked to slow down");
                }
                Ok(DeviceTokenPoll::Expired) => return Err(AuthError::AuthorizationExpired),
                Ok(DeviceTokenPoll::Denied(reason)) => {
                    return Err(AuthError::AuthorizationDenied { reason })
                }
                Err(e) => {
                    warn!(error = %e, "Device token poll failed, will retry");
                }
            }
        };

        let user = match self.helix.fetch_user(&tokens.access_token, None).await {
            CallOutcome::Success(Some(user)) => user,
            CallOutcome::Success(None) => {
                return Err(AuthError::Decode(
                    "users endpoint returned no account for the new token".to_string(),
                ))
            }
            CallOutcome::AuthInvalid => {
                return Err(AuthError::Http(
                    "users endpoint rejected the new token".to_string(),
                ))
            }
            CallOutcome::Failed(err) => return Err(AuthError::Http(err.to_string())),
        };

        let user_id = user.id.clone();
        self.commit(move |credential| {
            credential.access_token = Some(tokens.access_token);
            credential.refresh_token = tokens.refresh_token;
            credential.user_id = Some(user_id);
            credential.clear_device_fields();
        })
        .await
        .map_err(|e| AuthError::Persist(e.to_string()))?;

        info!(login = %user.login, user_id = %user.id, "Device authorization complete");
        Ok(user)
    }

    /// Check the access token with the provider.
    ///
    /// A 401 answer triggers [`refresh`](Self::refresh). Any other failure
    /// leaves the credential untouched.
    pub async fn validate(&self) -> Result<(), AuthError> {
        let token = self
            .access_token()
            .await
            .ok_or(AuthError::NotAuthenticated)?;

        match self.identity.validate(&token).await? {
            ValidateOutcome::Valid(info) => {
                debug!(login = ?info.login, expires_in = ?info.expires_in, "Access token valid");
                self.fill_user_id(info.user_id).await;
                Ok(())
            }
            ValidateOutcome::Invalid => {
                info!("Access token no longer valid, refreshing");
                self.refresh_rejected(&token).await
            }
            ValidateOutcome::Failed { status, message } => {
                Err(AuthError::ValidationFailed { status, message })
            }
        }
    }

    /// Exchange the refresh token for a new token pair.
    ///
    /// Concurrent callers share a single exchange and all receive its
    /// outcome. On failure the credential is left as it was.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.refresh_inner(None).await
    }

    /// Refresh because `rejected` was refused by the provider.
    ///
    /// Returns without an exchange when the held access token is no longer
    /// `rejected`: another caller already rotated it, and spending the new
    /// refresh token again would gain nothing.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<(), AuthError> {
        self.refresh_inner(Some(rejected)).await
    }

    async fn refresh_inner(&self, rejected: Option<&str>) -> Result<(), AuthError> {
        let seen = self.refresh_generation.load(Ordering::Acquire);
        let mut last = self.refresh_lock.lock().await;

        if self.refresh_generation.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                debug!("Joining refresh that completed while waiting");
                return outcome.clone();
            }
        }

        if let Some(rejected) = rejected {
            if self.access_token().await.as_deref() != Some(rejected) {
                debug!("Rejected token was already replaced, skipping refresh");
                return Ok(());
            }
        }

        let outcome = self.refresh_now().await;
        *last = Some(outcome.clone());
        self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn refresh_now(&self) -> Result<(), AuthError> {
        let refresh_token = self
            .credential
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;

        let tokens = match self.identity.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Refreshing tokens failed");
                return Err(e);
            }
        };

        // The new pair is already live in memory; a failed write only costs
        // us the next restart.
        let persisted = self
            .commit(move |credential| {
                *credential = std::mem::take(credential)
                    .with_tokens(tokens.access_token, tokens.refresh_token);
            })
            .await;
        if let Err(e) = persisted {
            error!(error = %e, "Failed to persist refreshed credential");
        }

        info!("Successfully refreshed tokens");
        Ok(())
    }

    async fn fill_user_id(&self, user_id: Option<String>) {
        let Some(user_id) = user_id else { return };
        if self.credential.read().await.user_id.is_some() {
            return;
        }
        let persisted = self
            .commit(move |credential| {
                credential.user_id.get_or_insert(user_id);
            })
            .await;
        if let Err(e) = persisted {
            warn!(error = %e, "Failed to persist account id");
        }
    }

    /// Apply `change` and write the result through the provider.
    ///
    /// The persist mutex is held from the change until the write returns,
    /// so writes land in the same order as the changes they carry.
    async fn commit(&self, change: impl FnOnce(&mut Credential)) -> Result<(), CredentialsError> {
        let _persist = self.persist_lock.lock().await;
        let snapshot = {
            let mut credential = self.credential.write().await;
            change(&mut credential);
            credential.clone()
        };
        self.provider.save(&snapshot).await
    }

    /// Validate every `period` for the rest of the process.
    ///
    /// Transient failures are logged and retried next period. The task ends
    /// only when the credential becomes unrecoverable, and yields that error.
    pub fn spawn_periodic_validation(self: &Arc<Self>, period: Duration) -> JoinHandle<AuthError> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                match store.validate().await {
                    Ok(()) => debug!("Scheduled validation passed"),
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, code = e.error_code(), "Credential unrecoverable, stopping validation");
                        return e;
                    }
                    Err(e) => {
                        warn!(error = %e, code = e.error_code(), "Scheduled validation failed");
                    }
                }
            }
        })
    }
}
