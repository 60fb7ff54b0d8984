//! modrelay - relays flagged live-chat messages to a review channel.
//!
//! The library keeps one EventSub websocket session alive and one
//! moderator credential valid for the lifetime of the process. It exposes
//! its modules for use in integration tests.

pub mod adapters;
pub mod auth;
pub mod error;
pub mod eventsub;
pub mod helix;
pub mod retry;
pub mod review;
pub mod startup;
pub mod traits;
