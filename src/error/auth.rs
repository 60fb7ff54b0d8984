//! Authentication-related error types.
//!
//! These errors come out of the credential lifecycle: device authorization,
//! token validation, refresh and persistence. They are `Clone` because a
//! single coalesced refresh hands the same outcome to every waiting caller.

use thiserror::Error;

/// Authentication-specific error variants.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    /// The device/user code expired before the user approved it.
    #[error("device authorization expired before it was approved")]
    AuthorizationExpired,

    /// The user (or the provider) refused the device authorization.
    #[error("device authorization was denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// The refresh-token exchange failed. No automatic recovery exists past this point.
    #[error("credential could not be refreshed: {message}")]
    AuthUnrecoverable { message: String },

    /// The validation endpoint answered with something other than success or 401.
    #[error("token validation failed with status {status}: {message}")]
    ValidationFailed { status: u16, message: String },

    /// A refresh was requested but no refresh token is held.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// No access token is held yet.
    #[error("no access token available")]
    NotAuthenticated,

    /// Writing the credential to durable storage failed.
    #[error("failed to persist credential: {0}")]
    Persist(String),

    /// The request to the identity provider did not complete.
    #[error("identity provider request failed: {0}")]
    Http(String),

    /// The identity provider answered with a body we could not decode.
    #[error("unexpected identity provider response: {0}")]
    Decode(String),
}

impl AuthError {
    /// Whether this error ends the process's ability to perform privileged calls.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::AuthUnrecoverable { .. }
                | AuthError::NoRefreshToken
                | AuthError::NotAuthenticated
                | AuthError::AuthorizationDenied { .. }
                | AuthError::AuthorizationExpired
        )
    }

    /// Short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::AuthorizationExpired => "AUTH_DEVICE_EXPIRED",
            AuthError::AuthorizationDenied { .. } => "AUTH_DEVICE_DENIED",
            AuthError::AuthUnrecoverable { .. } => "AUTH_UNRECOVERABLE",
            AuthError::ValidationFailed { .. } => "AUTH_VALIDATION_FAILED",
            AuthError::NoRefreshToken => "AUTH_NO_REFRESH_TOKEN",
            AuthError::NotAuthenticated => "AUTH_NOT_AUTHENTICATED",
            AuthError::Persist(_) => "AUTH_PERSIST_FAILED",
            AuthError::Http(_) => "AUTH_HTTP",
            AuthError::Decode(_) => "AUTH_DECODE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(AuthError::AuthUnrecoverable {
            message: "invalid refresh token".to_string()
        }
        .is_fatal());
        assert!(AuthError::NoRefreshToken.is_fatal());
        assert!(AuthError::AuthorizationExpired.is_fatal());
        assert!(!AuthError::Http("connection reset".to_string()).is_fatal());
        assert!(!AuthError::ValidationFailed {
            status: 500,
            message: "oops".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_display() {
        let err = AuthError::ValidationFailed {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "token validation failed with status 503: unavailable"
        );
        assert_eq!(
            AuthError::AuthorizationDenied {
                reason: "access_denied".to_string()
            }
            .to_string(),
            "device authorization was denied: access_denied"
        );
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            AuthError::AuthorizationExpired.error_code(),
            AuthError::NoRefreshToken.error_code(),
            AuthError::NotAuthenticated.error_code(),
            AuthError::Persist(String::new()).error_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
