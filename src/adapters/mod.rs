//! Concrete implementations of trait abstractions.
//!
//! This module provides the production adapters behind the traits defined
//! in `crate::traits`, plus test doubles for each of them.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`TungsteniteConnector`] - Websocket transport using tokio-tungstenite
//! - [`FileCredentialsProvider`] - File-based credentials storage
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles:
//! - [`mock::MockHttpClient`] - Configurable HTTP responses
//! - [`mock::MockConnector`] - Scripted transport connections
//! - [`mock::InMemoryCredentials`] - In-memory credential storage
//! - [`mock::RecordingReviewSink`] - Captures submitted events

pub mod file_credentials;
pub mod mock;
pub mod reqwest_http;
pub mod tungstenite_ws;

pub use file_credentials::FileCredentialsProvider;
pub use mock::{InMemoryCredentials, MockConnector, MockHttpClient, MockPeer, RecordingReviewSink};
pub use reqwest_http::ReqwestHttpClient;
pub use tungstenite_ws::{TungsteniteConnector, TungsteniteStream};
