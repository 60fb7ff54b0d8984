//! Client for the identity provider's OAuth endpoints.
//!
//! Covers the device authorization grant (RFC 8628), the refresh-token
//! exchange and token validation. This client is stateless: it never holds
//! token material, the [`CredentialStore`](super::store::CredentialStore)
//! does.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;
use crate::traits::{Headers, HttpClient, HttpError, Response};

/// Default base URL of the identity service.
pub const ID_API_URL: &str = "https://id.twitch.tv";

/// Grant type for the device token exchange.
pub const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Scopes needed to read chat and act on it as a moderator.
pub const DEFAULT_SCOPES: &str =
    "user:read:chat moderator:manage:chat_messages moderator:manage:banned_users";

/// Response from `POST /oauth2/device`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Lifetime of the device code, in seconds.
    pub expires_in: u64,
    /// Minimum polling interval, in seconds.
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Response from `POST /oauth2/token` for either grant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Response from `GET /oauth2/validate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidateResponse {
    pub client_id: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// One poll of the device token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceTokenPoll {
    Granted(TokenResponse),
    /// The user has not approved yet.
    Pending,
    /// Polling too fast; widen the interval.
    SlowDown,
    /// The device code is no longer valid.
    Expired,
    /// The grant was refused, or the device code was rejected outright.
    Denied(String),
}

/// Result of validating an access token.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidateOutcome {
    Valid(ValidateResponse),
    /// 401: the token is no longer accepted.
    Invalid,
    /// Any other non-success status.
    Failed { status: u16, message: String },
}

/// Error body shapes the identity service uses: `{"status":400,"message":"..."}`
/// and the RFC 6749 `{"error":"...","error_description":"..."}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn parse(response: &Response) -> Self {
        response.json().unwrap_or_default()
    }

    /// The most specific machine-readable reason available.
    fn reason(self, response: &Response) -> String {
        self.message
            .or(self.error)
            .unwrap_or_else(|| response.text_lossy())
    }
}

/// Stateless client for the OAuth endpoints.
pub struct IdentityApiClient {
    base_url: String,
    client_id: String,
    client_secret: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl IdentityApiClient {
    pub fn new(http: Arc<dyn HttpClient>, client_id: impl Into<String>) -> Self {
        Self {
            base_url: ID_API_URL.to_string(),
            client_id: client_id.into(),
            client_secret: None,
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Start a device authorization.
    ///
    /// POST /oauth2/device
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse, AuthError> {
        let url = format!("{}/oauth2/device", self.base_url);
        let body = form_encode(&[
            ("client_id", self.client_id.as_str()),
            ("scopes", DEFAULT_SCOPES),
        ]);

        let response = self.post_form(&url, &body).await?;
        if !response.is_success() {
            let reason = ErrorBody::parse(&response).reason(&response);
            return Err(AuthError::Http(format!(
                "device code request failed ({}): {}",
                response.status, reason
            )));
        }

        response
            .json()
            .map_err(|e| AuthError::Decode(format!("device code response: {}", e)))
    }

    /// Poll once for the token of a pending device authorization.
    ///
    /// POST /oauth2/token
    ///
    /// A 5xx or transport failure is returned as an error and is not
    /// terminal for the flow; every 4xx is a definite [`DeviceTokenPoll`].
    pub async fn poll_device_token(&self, device_code: &str) -> Result<DeviceTokenPoll, AuthError> {
        let url = format!("{}/oauth2/token", self.base_url);
        let body = form_encode(&[
            ("client_id", self.client_id.as_str()),
            ("scopes", DEFAULT_SCOPES),
            ("device_code", device_code),
            ("grant_type", DEVICE_GRANT_TYPE),
        ]);

        let response = self.post_form(&url, &body).await?;
        if response.is_success() {
            let tokens = response
                .json()
                .map_err(|e| AuthError::Decode(format!("token response: {}", e)))?;
            return Ok(DeviceTokenPoll::Granted(tokens));
        }

        if !(400..500).contains(&response.status) {
            return Err(AuthError::Http(format!(
                "device token poll failed ({}): {}",
                response.status,
                response.text_lossy()
            )));
        }

        let reason = ErrorBody::parse(&response).reason(&response);
        debug!(status = response.status, reason = %reason, "Device token not granted");
        Ok(classify_poll_reason(reason))
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// POST /oauth2/token
    ///
    /// A rejection by the provider is [`AuthError::AuthUnrecoverable`]. A
    /// transport failure is [`AuthError::Http`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let url = format!("{}/oauth2/token", self.base_url);
        let secret = self.client_secret.as_deref().unwrap_or_default();
        let body = form_encode(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        let response = self.post_form(&url, &body).await?;
        if !response.is_success() {
            let reason = ErrorBody::parse(&response).reason(&response);
            return Err(AuthError::AuthUnrecoverable {
                message: format!("refresh rejected ({}): {}", response.status, reason),
            });
        }

        response
            .json()
            .map_err(|e| AuthError::Decode(format!("refresh response: {}", e)))
    }

    /// Check whether an access token is still accepted.
    ///
    /// GET /oauth2/validate
    pub async fn validate(&self, access_token: &str) -> Result<ValidateOutcome, AuthError> {
        let url = format!("{}/oauth2/validate", self.base_url);
        let mut headers = Headers::new();
        headers.insert(
            "Authorization".to_string(),
            format!("OAuth {}", access_token),
        );

        let response = self.http.get(&url, &headers).await.map_err(http_error)?;
        match response.status {
            200..=299 => response
                .json()
                .map(ValidateOutcome::Valid)
                .map_err(|e| AuthError::Decode(format!("validate response: {}", e))),
            401 => Ok(ValidateOutcome::Invalid),
            status => Ok(ValidateOutcome::Failed {
                status,
                message: ErrorBody::parse(&response).reason(&response),
            }),
        }
    }

    async fn post_form(&self, url: &str, body: &str) -> Result<Response, AuthError> {
        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self.http.post(url, body, &headers).await.map_err(http_error)
    }
}

fn http_error(err: HttpError) -> AuthError {
    AuthError::Http(err.to_string())
}

fn classify_poll_reason(reason: String) -> DeviceTokenPoll {
    match reason.as_str() {
        "authorization_pending" => DeviceTokenPoll::Pending,
        "slow_down" => DeviceTokenPoll::SlowDown,
        "expired_token" => DeviceTokenPoll::Expired,
        r if r.contains("expired") => DeviceTokenPoll::Expired,
        _ => DeviceTokenPoll::Denied(reason),
    }
}

/// `application/x-www-form-urlencoded` body from key/value pairs.
pub(crate) fn form_encode(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
