//! Event-session error types.

use thiserror::Error;

use super::auth::AuthError;
use super::category::ErrorCategory;

/// Failures observed while running the event session.
///
/// Only [`SessionError::AuthUnrecoverable`] escapes the session loop; the
/// others are recovered internally and exist so they can be logged with a
/// consistent code.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    /// The transport closed without us asking it to, or never opened.
    #[error("transport lost: {reason}")]
    TransportLost { reason: String },

    /// A message we could not parse or did not expect.
    #[error("protocol anomaly: {detail}")]
    ProtocolAnomaly { detail: String },

    /// The provider refused or revoked our subscription.
    #[error("subscription rejected: {reason}")]
    SubscriptionRejected { reason: String },

    /// The keepalive watchdog saw no traffic for too long.
    #[error("session silent for {silent_secs}s (allowed {allowed_secs}s)")]
    KeepaliveExpired { silent_secs: u64, allowed_secs: u64 },

    /// The credential is gone; the session cannot be (re)established.
    #[error("credential unrecoverable: {0}")]
    AuthUnrecoverable(AuthError),
}

impl SessionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::TransportLost { .. } | SessionError::KeepaliveExpired { .. } => {
                ErrorCategory::Network
            }
            SessionError::ProtocolAnomaly { .. } => ErrorCategory::Protocol,
            SessionError::SubscriptionRejected { .. } => ErrorCategory::Client,
            SessionError::AuthUnrecoverable(_) => ErrorCategory::Auth,
        }
    }

    /// Whether the session loop answers this error with a reconnect.
    pub fn triggers_reconnect(&self) -> bool {
        matches!(
            self,
            SessionError::TransportLost { .. }
                | SessionError::SubscriptionRejected { .. }
                | SessionError::KeepaliveExpired { .. }
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::TransportLost { .. } => "SESSION_TRANSPORT_LOST",
            SessionError::ProtocolAnomaly { .. } => "SESSION_PROTOCOL_ANOMALY",
            SessionError::SubscriptionRejected { .. } => "SESSION_SUBSCRIPTION_REJECTED",
            SessionError::KeepaliveExpired { .. } => "SESSION_KEEPALIVE_EXPIRED",
            SessionError::AuthUnrecoverable(_) => "SESSION_AUTH_UNRECOVERABLE",
        }
    }
}
