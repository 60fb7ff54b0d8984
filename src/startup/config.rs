//! Relay configuration.
//!
//! Settings come from environment variables, with builder-style overrides
//! for tests and embedding.
//!
//! | Variable | Required | Meaning |
//! |----------|----------|---------|
//! | `TWITCH_CLIENT_ID` | yes | Application client id |
//! | `TWITCH_CLIENT_SECRET` | no | Sent with refresh requests when set |
//! | `BROADCASTER_LOGIN` | yes | Channel whose chat is watched |
//! | `MIN_AGE_SECONDS` | no | Accounts younger than this are reviewed (default 7 days) |
//! | `POSTING_CHANNEL_ID` | no | Review destination id |
//! | `MODRELAY_TOKENS_PATH` | no | Credential file (default `~/.modrelay/tokens.json`) |
//! | `MODRELAY_EVENTSUB_URL` | no | Websocket endpoint override |
//! | `MODRELAY_HELIX_URL` | no | Helix base URL override |
//! | `MODRELAY_ID_URL` | no | Identity service base URL override |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::auth::{DEFAULT_VALIDATION_PERIOD, ID_API_URL};
use crate::eventsub::EVENTSUB_WS_URL;
use crate::helix::HELIX_API_URL;

/// Minimum account age used when `MIN_AGE_SECONDS` is unset.
pub const DEFAULT_MIN_ACCOUNT_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub broadcaster_login: String,
    pub min_account_age: Duration,
    pub posting_channel_id: Option<String>,
    /// `None` selects the default location.
    pub tokens_path: Option<PathBuf>,
    pub eventsub_url: String,
    pub helix_url: String,
    pub identity_url: String,
    pub validation_period: Duration,
    /// Try to open the verification page during device authorization.
    pub open_browser: bool,
}

impl RelayConfig {
    pub fn new(client_id: impl Into<String>, broadcaster_login: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            broadcaster_login: broadcaster_login.into(),
            min_account_age: DEFAULT_MIN_ACCOUNT_AGE,
            posting_channel_id: None,
            tokens_path: None,
            eventsub_url: EVENTSUB_WS_URL.to_string(),
            helix_url: HELIX_API_URL.to_string(),
            identity_url: ID_API_URL.to_string(),
            validation_period: DEFAULT_VALIDATION_PERIOD,
            open_browser: false,
        }
    }

    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let client_id = get("TWITCH_CLIENT_ID").ok_or(ConfigError::Missing("TWITCH_CLIENT_ID"))?;
        let broadcaster_login =
            get("BROADCASTER_LOGIN").ok_or(ConfigError::Missing("BROADCASTER_LOGIN"))?;

        let mut config = Self::new(client_id, broadcaster_login);
        config.client_secret = get("TWITCH_CLIENT_SECRET");
        config.posting_channel_id = get("POSTING_CHANNEL_ID");
        config.tokens_path = get("MODRELAY_TOKENS_PATH").map(PathBuf::from);

        if let Some(raw) = get("MIN_AGE_SECONDS") {
            let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                name: "MIN_AGE_SECONDS",
                message: format!("expected a whole number of seconds, got {:?}", raw),
            })?;
            config.min_account_age = Duration::from_secs(secs);
        }
        if let Some(url) = get("MODRELAY_EVENTSUB_URL") {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::Invalid {
                    name: "MODRELAY_EVENTSUB_URL",
                    message: format!("not a websocket URL: {}", url),
                });
            }
            config.eventsub_url = url;
        }
        if let Some(url) = get("MODRELAY_HELIX_URL") {
            config.helix_url = url;
        }
        if let Some(url) = get("MODRELAY_ID_URL") {
            config.identity_url = url;
        }

        Ok(config)
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_min_account_age(mut self, age: Duration) -> Self {
        self.min_account_age = age;
        self
    }

    pub fn with_posting_channel_id(mut self, id: impl Into<String>) -> Self {
        self.posting_channel_id = Some(id.into());
        self
    }

    pub fn with_tokens_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokens_path = Some(path.into());
        self
    }

    pub fn with_eventsub_url(mut self, url: impl Into<String>) -> Self {
        self.eventsub_url = url.into();
        self
    }

    pub fn with_helix_url(mut self, url: impl Into<String>) -> Self {
        self.helix_url = url.into();
        self
    }

    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    pub fn with_validation_period(mut self, period: Duration) -> Self {
        self.validation_period = period;
        self
    }

    pub fn with_open_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }
}
