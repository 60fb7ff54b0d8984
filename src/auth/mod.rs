//! Authentication for the privileged account.
//!
//! - Credential record and its file storage
//! - Identity provider client (device grant, refresh, validate)
//! - The credential store that owns the token lifecycle

pub mod credentials;
pub mod identity_api;
pub mod store;

pub use credentials::{Credential, CredentialsManager};
pub use identity_api::{IdentityApiClient, DEFAULT_SCOPES, ID_API_URL};
pub use store::{CredentialStore, DEFAULT_POLL_INTERVAL, DEFAULT_VALIDATION_PERIOD};
