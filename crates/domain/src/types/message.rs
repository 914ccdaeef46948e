//! Flow message exchanged with action nodes
//!
//! A message carries a JSON `payload`, optional transport `headers` (used to
//! pass list continuation tokens between invocations), and any other fields
//! the caller attached, which are passed through untouched.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{LakeflowError, Result};

/// Unit of work flowing into and out of an action node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowMessage {
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowMessage {
    /// Create a message carrying only a payload.
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self { payload, ..Self::default() }
    }

    /// Replace the payload, keeping headers and pass-through fields.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Header value as a string, if present and textual.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Decode node parameters from the payload.
    ///
    /// A payload that is not a JSON object carries no parameters and yields
    /// `T::default()`.
    ///
    /// # Errors
    /// Returns `LakeflowError::InvalidInput` when a field has the wrong shape.
    pub fn params<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match &self.payload {
            Value::Object(_) => serde_json::from_value(self.payload.clone())
                .map_err(|err| LakeflowError::InvalidInput(format!("invalid payload: {err}"))),
            _ => Ok(T::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::LeaseParams;

    #[test]
    fn passes_unknown_fields_through() {
        let raw = json!({"payload": {"url": "u"}, "topic": "lake", "_msgid": "42"});
        let msg: FlowMessage = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(msg.extra["topic"], "lake");
        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_skips_null() {
        let mut msg = FlowMessage::default();
        msg.headers.insert("X-Ms-Continuation".into(), json!("tok"));
        assert_eq!(msg.header_str("x-ms-continuation"), Some("tok"));

        msg.headers.insert("X-Ms-Continuation".into(), Value::Null);
        assert_eq!(msg.header_str("x-ms-continuation"), None);
    }

    #[test]
    fn non_object_payload_yields_default_params() {
        let msg = FlowMessage::new(json!("trigger"));
        let params: LeaseParams = msg.params().unwrap();
        assert_eq!(params, LeaseParams::default());
    }

    #[test]
    fn malformed_params_are_invalid_input() {
        let msg = FlowMessage::new(json!({"leaseduration": "forever"}));
        let err = msg.params::<LeaseParams>().unwrap_err();
        assert!(matches!(err, LakeflowError::InvalidInput(_)));
    }
}
