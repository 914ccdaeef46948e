//! # Lakeflow Infrastructure
//!
//! I/O-facing implementations behind the Lakeflow action nodes.
//!
//! This crate contains:
//! - The outbound HTTP client
//! - Configuration loading (environment and JSON/TOML files)
//! - The storage action executors (lease, files, tables, automation upload)
//!
//! ## Architecture
//! - Depends on `lakeflow-domain` for configuration and message types
//! - Obtains tokens through `lakeflow-common`'s token lifecycle manager
//! - Contains all "impure" code (network, filesystem, environment)

pub mod actions;
pub mod config;
pub mod errors;
pub mod http;

// Re-export commonly used items
pub use actions::{AccessTokenProvider, ActionError, NodeKind, Nodes};
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
