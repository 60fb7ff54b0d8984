//! Refresh-and-retry-once wrapper for privileged calls.
//!
//! Every call that presents the privileged access token runs through
//! [`RetryableRequest::execute`]. A call reports [`CallOutcome::AuthInvalid`]
//! when the provider rejected the token; the wrapper then refreshes the
//! credential once and repeats the call once. Nothing else is retried here.

use std::future::Future;

use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::error::{ApiError, AuthError};

/// Result of a single attempt of a privileged call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    /// The token was rejected (HTTP 401).
    AuthInvalid,
    /// Any other failure. Never retried by the wrapper.
    Failed(ApiError),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }
}

/// Executes privileged calls against the token held by a [`CredentialStore`].
pub struct RetryableRequest<'a> {
    store: &'a CredentialStore,
}

impl<'a> RetryableRequest<'a> {
    pub fn new(store: &'a CredentialStore) -> Self {
        Self { store }
    }

    /// Run `call` with the current access token, refreshing and repeating at
    /// most once.
    ///
    /// - `Success` on either attempt is returned.
    /// - `AuthInvalid` on the first attempt triggers one refresh, unless
    ///   another caller already replaced the rejected token. If the
    ///   refresh fails the error is returned as
    ///   [`ApiError::AuthUnrecoverable`] with no second attempt.
    /// - `AuthInvalid` on the second attempt is [`ApiError::Unauthorized`].
    /// - `Failed` is returned as-is.
    pub async fn execute<T, F, Fut>(&self, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let token = self.current_token().await?;
        match call(token.clone()).await {
            CallOutcome::Success(value) => return Ok(value),
            CallOutcome::Failed(err) => return Err(err),
            CallOutcome::AuthInvalid => {
                debug!("Privileged call rejected the access token, refreshing");
            }
        }

        if let Err(err) = self.store.refresh_rejected(&token).await {
            warn!(error = %err, code = err.error_code(), "Refresh after 401 failed");
            return Err(ApiError::AuthUnrecoverable(err));
        }

        let token = self.current_token().await?;
        match call(token).await {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Failed(err) => Err(err),
            CallOutcome::AuthInvalid => Err(ApiError::Unauthorized {
                message: "access token rejected after refresh".to_string(),
            }),
        }
    }

    async fn current_token(&self) -> Result<String, ApiError> {
        self.store
            .access_token()
            .await
            .ok_or(ApiError::AuthUnrecoverable(AuthError::NotAuthenticated))
    }
}
