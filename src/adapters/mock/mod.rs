//! Mock implementations for testing.
//!
//! Each trait seam in `crate::traits` has a double here, so the credential
//! store, the Helix client and the session manager can be exercised without
//! network or filesystem access.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`MockConnector`] - Transport whose connections the test drives
//! - [`InMemoryCredentials`] - In-memory credential storage
//! - [`RecordingReviewSink`] - Review sink that records submissions

pub mod credentials;
pub mod http;
pub mod review;
pub mod transport;

pub use credentials::InMemoryCredentials;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use review::RecordingReviewSink;
pub use transport::{MockConnector, MockPeer};
