//! Unified error handling for the relay.
//!
//! - **Error Categories**: high-level classification for retry decisions
//! - **Domain errors**: `AuthError`, `ApiError`, `SessionError`
//! - **Unified error**: `RelayError` with `RelayResult<T>`
//!
//! | Category | Description | Retryable |
//! |----------|-------------|-----------|
//! | Network | Transport lost, connect failure | Yes |
//! | Auth | Token invalid or unrecoverable | Once, via refresh |
//! | RateLimit | HTTP 429 | Caller decides |
//! | Server | HTTP 5xx | Yes |
//! | Client | Other 4xx | No |
//! | Protocol | Malformed provider messages | No (ignored) |
//! | Configuration | Missing settings | No |
//! | System | Filesystem errors | No |

mod api;
mod auth;
mod category;
mod relay_error;
mod result;
mod session;

pub use api::ApiError;
pub use auth::AuthError;
pub use category::ErrorCategory;
pub use relay_error::RelayError;
pub use result::RelayResult;
pub use session::SessionError;
