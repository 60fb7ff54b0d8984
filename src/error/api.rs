//! Privileged API error types.
//!
//! Every Helix call resolves to one of these when it does not succeed. The
//! variants mirror the status codes the moderation endpoints document.

use thiserror::Error;

use super::auth::AuthError;
use super::category::ErrorCategory;

/// Failure of a privileged REST call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Still unauthorized after the single refresh-and-retry.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    /// Someone else is updating the same resource (e.g. a ban in progress).
    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The credential could not be refreshed; the call was not retried.
    #[error("credential unrecoverable: {0}")]
    AuthUnrecoverable(AuthError),

    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status (other than 401, which the retry wrapper
    /// consumes) to an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => ApiError::BadRequest { message },
            401 => ApiError::Unauthorized { message },
            403 => ApiError::Forbidden { message },
            404 => ApiError::NotFound { message },
            409 => ApiError::Conflict { message },
            429 => ApiError::RateLimited {
                message,
                retry_after_secs: None,
            },
            500..=599 => ApiError::ServerError { status, message },
            _ => ApiError::UnexpectedStatus { status, message },
        }
    }

    /// Category used by callers to decide on their own retry policy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Unauthorized { .. } | ApiError::AuthUnrecoverable(_) => ErrorCategory::Auth,
            ApiError::RateLimited { .. } => ErrorCategory::RateLimit,
            ApiError::ServerError { .. } => ErrorCategory::Server,
            ApiError::Transport(_) => ErrorCategory::Network,
            ApiError::Decode(_) => ErrorCategory::Protocol,
            ApiError::BadRequest { .. }
            | ApiError::Forbidden { .. }
            | ApiError::NotFound { .. }
            | ApiError::Conflict { .. }
            | ApiError::UnexpectedStatus { .. } => ErrorCategory::Client,
        }
    }

    /// Whether the credential behind the call is gone for good.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::AuthUnrecoverable(err) if err.is_fatal())
    }

    /// HTTP status this error was derived from, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest { .. } => Some(400),
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Conflict { .. } => Some(409),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::ServerError { status, .. } | ApiError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "API_BAD_REQUEST",
            ApiError::Unauthorized { .. } => "API_UNAUTHORIZED",
            ApiError::Forbidden { .. } => "API_FORBIDDEN",
            ApiError::NotFound { .. } => "API_NOT_FOUND",
            ApiError::Conflict { .. } => "API_CONFLICT",
            ApiError::RateLimited { .. } => "API_RATE_LIMITED",
            ApiError::ServerError { .. } => "API_SERVER_ERROR",
            ApiError::UnexpectedStatus { .. } => "API_UNEXPECTED_STATUS",
            ApiError::AuthUnrecoverable(_) => "API_AUTH_UNRECOVERABLE",
            ApiError::Transport(_) => "API_TRANSPORT",
            ApiError::Decode(_) => "API_DECODE",
        }
    }
}
