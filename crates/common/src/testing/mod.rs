//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted token endpoint and recording browser
//! - **[`async_utils`]**: polling helpers for background effects
//!
//! ## Usage
//!
//! ```rust
//! use lakeflow_common::testing::{MockTokenExchange, RecordingBrowser};
//!
//! let exchange = MockTokenExchange::new();
//! exchange.push_token("A", Some("R"), 3600);
//! let browser = RecordingBrowser::new();
//! assert!(browser.urls().is_empty());
//! ```

pub mod async_utils;
pub mod mocks;

pub use async_utils::poll_until;
pub use mocks::{MockTokenExchange, RecordingBrowser};
