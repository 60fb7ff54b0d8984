//! Error category classification for unified error handling.
//!
//! Categories drive the retry decisions made by the session loop and the
//! privileged-call wrapper, and give log lines a stable label.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport or HTTP connectivity failures. Transient.
    Network,

    /// Credential problems. Recoverable once through a refresh, otherwise fatal.
    Auth,

    /// Provider asked us to slow down.
    RateLimit,

    /// Provider-side failures (HTTP 5xx).
    Server,

    /// Requests the provider refused on their merits (4xx other than 401/429).
    Client,

    /// Unexpected or malformed messages from the provider.
    Protocol,

    /// Missing or invalid configuration.
    Configuration,

    /// Filesystem and OS errors.
    System,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    ///
    /// Rate limits are deliberately excluded: they are surfaced to the
    /// caller, who decides whether a domain-specific retry makes sense.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Server => "server",
            ErrorCategory::Client => "client",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::System => "system",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
