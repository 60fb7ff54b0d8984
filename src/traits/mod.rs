//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP client operations (GET, POST, DELETE)
//! - [`TransportConnector`] / [`TransportStream`] - event transport connections
//! - [`CredentialsProvider`] - Credential storage and retrieval
//! - [`ReviewSink`] - Destination for flagged chat events
//! - [`AccountDirectory`] - Account metadata lookup

pub mod credentials;
pub mod http;
pub mod review;
pub mod transport;

pub use credentials::{CredentialsError, CredentialsProvider};
pub use http::{Headers, HttpClient, HttpError, Response};
pub use review::{AccountDirectory, ReviewSink};
pub use transport::{TransportConnector, TransportError, TransportFrame, TransportStream};
