//! Configuration loading and management
//!
//! This module loads the application configuration from environment
//! variables and files, and turns the OAuth2 section into a ready-to-use
//! token lifecycle manager.

pub mod loader;
pub mod oauth;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, parse_config, probe_config_paths};
pub use oauth::{callback_mode, client_config, token_manager};
