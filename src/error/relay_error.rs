//! Unified error type for the relay.
//!
//! `RelayError` consolidates the domain errors so the binary and the
//! supervisor can categorize and log any failure the same way.

use thiserror::Error;

use super::api::ApiError;
use super::auth::AuthError;
use super::category::ErrorCategory;
use super::session::SessionError;
use crate::startup::config::ConfigError;
use crate::traits::CredentialsError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::Auth(_) => ErrorCategory::Auth,
            RelayError::Api(err) => err.category(),
            RelayError::Session(err) => err.category(),
            RelayError::Config(_) => ErrorCategory::Configuration,
            RelayError::Credentials(_) | RelayError::Io(_) => ErrorCategory::System,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the error means no privileged work can continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            RelayError::Auth(err) => err.is_fatal(),
            RelayError::Api(err) => err.is_fatal(),
            RelayError::Session(SessionError::AuthUnrecoverable(err)) => err.is_fatal(),
            RelayError::Config(_) => true,
            _ => false,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::Auth(err) => err.error_code(),
            RelayError::Api(err) => err.error_code(),
            RelayError::Session(err) => err.error_code(),
            RelayError::Config(_) => "CONFIG_INVALID",
            RelayError::Credentials(_) => "CREDENTIALS_STORAGE",
            RelayError::Io(_) => "IO",
        }
    }
}
