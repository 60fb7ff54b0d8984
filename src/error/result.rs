//! Result type alias for relay operations.

use super::relay_error::RelayError;

/// Type alias for Results using RelayError.
///
/// ```ignore
/// use modrelay::error::RelayResult;
///
/// async fn bootstrap() -> RelayResult<()> {
///     let config = RelayConfig::from_env()?;
///     Ok(())
/// }
/// ```
pub type RelayResult<T> = Result<T, RelayError>;
