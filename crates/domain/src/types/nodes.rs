//! Action node parameters
//!
//! Each node reads its parameters from the incoming message payload and falls
//! back to the node's configured defaults field by field. Wire names match the
//! keys flow authors already use (`leaseduration`, `filePath`,
//! `maxResultsUploadData`, ...).

use serde::{Deserialize, Serialize};

use crate::impl_keyword_conversions;
use crate::types::lenient;

/// Generates `or`, which fills every absent field from `defaults`.
macro_rules! impl_param_fallback {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        impl $name {
            /// Fill absent fields from the node defaults.
            #[must_use]
            pub fn or(self, defaults: &Self) -> Self {
                Self {
                    $($field: self.$field.or_else(|| defaults.$field.clone()),)+
                }
            }
        }
    };
}

// ----------------------------------------------------------------------------
// Lease
// ----------------------------------------------------------------------------

/// Path lease operations (`x-ms-lease-action`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    Acquire,
    Break,
    Renew,
    Release,
    Change,
}

impl_keyword_conversions!(LeaseAction {
    Acquire => "acquire",
    Break => "break",
    Renew => "renew",
    Release => "release",
    Change => "change",
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseParams {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub action: Option<String>,
    #[serde(
        rename = "leaseduration",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub lease_duration: Option<i64>,
    #[serde(
        rename = "leaseid",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub lease_id: Option<String>,
    #[serde(
        rename = "leaseidnew",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub proposed_lease_id: Option<String>,
}

impl_param_fallback!(LeaseParams { url, action, lease_duration, lease_id, proposed_lease_id });

// ----------------------------------------------------------------------------
// Files
// ----------------------------------------------------------------------------

/// Path and filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Create,
    Delete,
    Read,
    GetProperties,
    List,
    Update,
}

impl_keyword_conversions!(FileAction {
    Create => "create",
    Delete => "delete",
    Read => "read",
    GetProperties => "getproperties",
    List => "list",
    Update => "update",
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParams {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub action: Option<String>,
    /// Local file streamed by `update`.
    #[serde(
        rename = "filePath",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_bool")]
    pub overwrite: Option<bool>,
    #[serde(
        rename = "maxResults",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_u32"
    )]
    pub max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_bool")]
    pub recursive: Option<bool>,
    /// Explicit list continuation; the `x-ms-continuation` message header
    /// takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub continuation: Option<String>,
}

impl_param_fallback!(FileParams {
    url,
    action,
    file_path,
    overwrite,
    max_results,
    recursive,
    continuation,
});

// ----------------------------------------------------------------------------
// Tables
// ----------------------------------------------------------------------------

/// Table listing and bulk-load operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAction {
    Read,
    Upload,
}

impl_keyword_conversions!(TableAction {
    Read => "read",
    Upload => "upload",
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableParams {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub action: Option<String>,
    #[serde(
        rename = "maxResultsUploadData",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_u32"
    )]
    pub max_results: Option<u32>,
    #[serde(
        rename = "continuationToken",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub continuation_token: Option<String>,
    #[serde(
        rename = "tableName",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub table_name: Option<String>,
    /// Storage path of the data to load, relative to the lakehouse root.
    #[serde(
        rename = "filePath",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub relative_path: Option<String>,
    #[serde(
        rename = "pathType",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub path_type: Option<String>,
    #[serde(
        rename = "modeType",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub mode: Option<String>,
    #[serde(
        rename = "formatType",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub delimiter: Option<String>,
    #[serde(
        rename = "headerRow",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_bool"
    )]
    pub header: Option<bool>,
}

impl_param_fallback!(TableParams {
    url,
    action,
    max_results,
    continuation_token,
    table_name,
    relative_path,
    path_type,
    mode,
    format,
    delimiter,
    header,
});

// ----------------------------------------------------------------------------
// Data automation upload
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationParams {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    #[serde(
        rename = "filePath",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub file_path: Option<String>,
}

impl_param_fallback!(AutomationParams { url, file_path });
