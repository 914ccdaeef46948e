//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the OAuth2 client variables are incomplete, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `LAKEFLOW_CLIENT_ID`, `LAKEFLOW_CLIENT_SECRET`: OAuth2 client credentials
//! - `LAKEFLOW_AUTH_URL`, `LAKEFLOW_TOKEN_URL`: provider endpoints
//! - `LAKEFLOW_REDIRECT_URI`: registered redirect URI
//!
//! Optional:
//! - `LAKEFLOW_SCOPES`: space-separated scopes
//! - `LAKEFLOW_CALLBACK_MODE`: `hosted` or `standalone`
//! - `LAKEFLOW_AUTH_TIMEOUT_SECS`: give up on a browser flow after N seconds
//! - `LAKEFLOW_OPEN_BROWSER`: open the system browser (true/false)
//! - `LAKEFLOW_HTTP_TIMEOUT_SECS`: storage request timeout
//! - `LAKEFLOW_BIND`: host server address
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./lakeflow.json` or `./lakeflow.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use lakeflow_domain::{CallbackMode, Config, LakeflowError, OAuth2Settings, Result};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `LakeflowError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The five OAuth2 client variables must be present; everything else falls
/// back to its default.
///
/// # Errors
/// Returns `LakeflowError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let oauth2 = OAuth2Settings {
        client_id: env_var("LAKEFLOW_CLIENT_ID")?,
        client_secret: env_var("LAKEFLOW_CLIENT_SECRET")?,
        auth_url: env_var("LAKEFLOW_AUTH_URL")?,
        token_url: env_var("LAKEFLOW_TOKEN_URL")?,
        redirect_uri: env_var("LAKEFLOW_REDIRECT_URI")?,
        scopes: std::env::var("LAKEFLOW_SCOPES").unwrap_or_default(),
    };

    let mut config = Config { oauth2: Some(oauth2), ..Config::default() };

    if let Some(mode) = env_opt("LAKEFLOW_CALLBACK_MODE") {
        config.auth.callback_mode = CallbackMode::from_str(&mode)
            .map_err(|e| LakeflowError::Config(format!("Invalid callback mode: {e}")))?;
    }
    if let Some(secs) = env_opt("LAKEFLOW_AUTH_TIMEOUT_SECS") {
        let secs = secs.parse::<u64>().map_err(|e| {
            LakeflowError::Config(format!("Invalid authorization timeout: {e}"))
        })?;
        config.auth.authorization_timeout_secs = Some(secs);
    }
    config.auth.open_browser = env_bool("LAKEFLOW_OPEN_BROWSER", config.auth.open_browser);
    if let Some(secs) = env_opt("LAKEFLOW_HTTP_TIMEOUT_SECS") {
        config.http.timeout_secs = secs
            .parse::<u64>()
            .map_err(|e| LakeflowError::Config(format!("Invalid HTTP timeout: {e}")))?;
    }
    if let Some(bind) = env_opt("LAKEFLOW_BIND") {
        config.server.bind = bind;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `LakeflowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(LakeflowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            LakeflowError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| LakeflowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); a path without
/// an extension is read as JSON.
///
/// # Errors
/// Returns `LakeflowError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| LakeflowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| LakeflowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(LakeflowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Returns the first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("lakeflow.json"),
        dir.join("lakeflow.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `LakeflowError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        LakeflowError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Optional variable; unset and blank are the same.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
