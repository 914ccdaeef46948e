//! # Lakeflow Domain
//!
//! Domain types shared by every Lakeflow crate.
//!
//! This crate contains:
//! - The domain error type and `Result` alias
//! - Configuration structures (OAuth2 client, callback hosting, HTTP, nodes)
//! - The flow message exchanged with action nodes
//! - Per-node parameter types and their action enums
//!
//! ## Architecture
//! - No dependencies on other Lakeflow crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
