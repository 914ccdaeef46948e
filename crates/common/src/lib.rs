//! Shared building blocks for Lakeflow crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime`: clock abstraction used for token expiry math
//! - `platform`: the OAuth2 authorization-code token lifecycle (`auth`)
//! - `test-utils`: scripted token exchange and recording browser mocks

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod time;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", all(test, feature = "platform")))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "platform")]
pub use auth::{
    AuthError, CallbackMode, OAuth2ClientConfig, TokenLifecycleManager, TokenRecord,
};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
