//! Helix REST API.
//!
//! - [`HelixApi`] performs single attempts with an explicit token.
//! - [`HelixClient`] binds it to the [`CredentialStore`](crate::auth::CredentialStore)
//!   with refresh-and-retry-once semantics.

pub mod api;
pub mod client;
pub mod types;

pub use api::{HelixApi, HELIX_API_URL};
pub use client::HelixClient;
pub use types::{HelixUser, SubscriptionInfo, SubscriptionRequest, CHAT_MESSAGE_SUBSCRIPTION};
