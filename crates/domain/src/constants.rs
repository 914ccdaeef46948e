//! Application constants
//!
//! Defaults shared by configuration parsing and the action nodes.

// Host server
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:1880";

// HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 4 * 1024 * 1024;

// Node defaults
pub const DEFAULT_LEASE_DURATION_SECS: i64 = -1; // infinite lease
pub const DEFAULT_LIST_MAX_RESULTS: u32 = 5000;
pub const DEFAULT_TABLE_MAX_RESULTS: u32 = 5;

// Storage headers
pub const CONTINUATION_HEADER: &str = "x-ms-continuation";
