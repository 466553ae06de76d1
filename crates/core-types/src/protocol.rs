//! Protocol result model shared by the dispatcher and the command runtime.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status value reported by the remote endpoint when an action failed before
/// producing a protocol-level status of its own.
pub const NETWORK_ERROR_STATUS: i64 = -1;

/// Result of one remote protocol action.
///
/// `status == -1` marks a failed action. When the failure happened below the
/// protocol (socket reset, refused connection) the transport attaches the
/// OS-level error code in `code`; protocol-level failures carry only the
/// error message and, when available, the remote stack.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProtocolResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ProtocolResponse {
    pub fn success(value: Value) -> Self {
        Self {
            status: 0,
            value,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: NETWORK_ERROR_STATUS,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn network_failure(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: NETWORK_ERROR_STATUS,
            error: Some(error.into()),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == NETWORK_ERROR_STATUS
    }

    /// Failure caused below the protocol: the transport reported an OS-level
    /// error code such as `ECONNRESET`.
    pub fn is_network_error(&self) -> bool {
        self.is_failure() && self.code.is_some()
    }

    /// Failure reported by the protocol endpoint itself.
    pub fn is_protocol_failure(&self) -> bool {
        self.is_failure() && self.code.is_none()
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown protocol error")
    }

    /// Serializes the response into the JSON shape command results use.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Reads a command result back as a protocol response, when it has that
    /// shape. Plain command values (numbers, strings, arbitrary objects) do
    /// not qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.contains_key("status") {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_network_and_protocol_failures() {
        let net = ProtocolResponse::network_failure("ECONNRESET", "connection reset");
        assert!(net.is_failure());
        assert!(net.is_network_error());
        assert!(!net.is_protocol_failure());

        let proto = ProtocolResponse::failure("no such element");
        assert!(proto.is_failure());
        assert!(proto.is_protocol_failure());
        assert!(!proto.is_network_error());

        let ok = ProtocolResponse::success(json!({"ELEMENT": "abc"}));
        assert!(!ok.is_failure());
    }

    #[test]
    fn round_trips_through_value() {
        let resp = ProtocolResponse::failure("stale element").with_stack("remote stack");
        let value = resp.to_value();
        let parsed = ProtocolResponse::from_value(&value).expect("protocol-shaped value");
        assert_eq!(parsed.status, NETWORK_ERROR_STATUS);
        assert_eq!(parsed.stack.as_deref(), Some("remote stack"));
    }

    #[test]
    fn plain_values_are_not_protocol_responses() {
        assert!(ProtocolResponse::from_value(&json!(42)).is_none());
        assert!(ProtocolResponse::from_value(&json!({"value": 1})).is_none());
    }
}
