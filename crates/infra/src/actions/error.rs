//! Action node errors
//!
//! Display strings are what flow authors see in the `{ "error": ... }`
//! payload, so they keep the wording flows already match on.

use lakeflow_common::auth::AuthError;
use lakeflow_domain::{FlowMessage, LakeflowError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Parameters failed validation; no request was sent.
    #[error("{0}")]
    InvalidInput(String),

    /// No access token could be obtained; no request was sent.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The storage service answered with a non-2xx status.
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request was sent but nothing usable came back.
    #[error("No response received from server")]
    NoResponse { detail: String },

    /// The request could not be prepared (bad URL, unreadable upload source).
    #[error("Error setting up request: {0}")]
    Setup(String),

    /// A 2xx response lacked something the next step needs.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ActionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Replace the message payload with `{ "error": <message> }`.
    #[must_use]
    pub fn into_message(self, msg: FlowMessage) -> FlowMessage {
        msg.with_payload(json!({ "error": self.to_string() }))
    }
}

impl From<LakeflowError> for ActionError {
    fn from(err: LakeflowError) -> Self {
        match err {
            LakeflowError::Network(detail) => Self::NoResponse { detail },
            LakeflowError::InvalidInput(message) => Self::Setup(message),
            other => Self::Setup(other.to_string()),
        }
    }
}

impl From<ActionError> for LakeflowError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::InvalidInput(message) => Self::InvalidInput(message),
            ActionError::Auth(auth) => Self::Auth(auth.to_string()),
            ActionError::NoResponse { detail } => Self::Network(detail),
            ActionError::Setup(message) => Self::Io(message),
            other => Self::Network(other.to_string()),
        }
    }
}
