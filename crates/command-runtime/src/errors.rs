//! Error taxonomy of the command runtime.

use serde_json::{json, Value};
use thiserror::Error;
use transport_dispatch::DispatchError;

/// Identifying-name suffixes of errors that already reported themselves at
/// their source (assertion failures, mount failures, harness test errors).
/// The pipeline must neither log nor register these again.
const SELF_REPORTING_SUFFIXES: [&str; 3] = ["AssertError", "AssertionError", "MountError"];

#[derive(Debug, Error, Clone)]
pub enum CommandError {
    /// The built definition lacks a callable `command` member. Fatal, raised
    /// at construction time, never retried.
    #[error("command `{command}` does not provide a callable `command` method")]
    InterfaceViolation { command: String },

    /// A command instance is single-use; a second invocation is a
    /// programming error in the caller.
    #[error("command `{command}` was invoked more than once")]
    AlreadyInvoked { command: String },

    #[error("invalid command mount path `{0}`")]
    MountPath(String),

    /// Propagated from the external element-selector resolver.
    #[error("selector resolution failed: {0}")]
    SelectorResolution(String),

    /// Synthesized from a protocol result reporting a failure status.
    #[error("protocol action error (status {status}): {message}")]
    ProtocolAction {
        status: i64,
        message: String,
        stack: Option<String>,
    },

    /// Protocol result carrying an OS-level error code.
    #[error("network error {code}: {message}")]
    Network { code: String, message: String },

    /// Error raised inside a command body, carrying the foreign identifying
    /// name used for classification.
    #[error("{name}: {message}")]
    Invocation { name: String, message: String },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl CommandError {
    pub fn invocation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            name: name.into(),
            message: message.into(),
        }
    }

    /// The identifying name classification works on.
    pub fn name(&self) -> &str {
        match self {
            CommandError::InterfaceViolation { .. } => "InterfaceViolationError",
            CommandError::AlreadyInvoked { .. } => "AlreadyInvokedError",
            CommandError::MountPath(_) => "MountPathError",
            CommandError::SelectorResolution(_) => "SelectorResolutionError",
            CommandError::ProtocolAction { .. } => "ProtocolActionError",
            CommandError::Network { .. } => "NetworkError",
            CommandError::Invocation { name, .. } => name,
            CommandError::Dispatch(_) => "DispatchError",
        }
    }

    /// Whether the originating layer already logged and registered this
    /// error.
    pub fn is_self_reporting(&self) -> bool {
        is_self_reporting_name(self.name())
    }

    pub fn stack(&self) -> Option<&str> {
        match self {
            CommandError::ProtocolAction { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }

    /// The error as result data. Future-based pipeline runs resolve with
    /// this value instead of rejecting.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "name": self.name(),
            "message": self.to_string(),
        });
        if let Some(stack) = self.stack() {
            value["stack"] = json!(stack);
        }
        value
    }
}

pub fn is_self_reporting_name(name: &str) -> bool {
    SELF_REPORTING_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_reporting_names_are_recognized() {
        assert!(is_self_reporting_name("NightwatchAssertError"));
        assert!(is_self_reporting_name("AssertionError"));
        assert!(is_self_reporting_name("ComponentMountError"));
        assert!(!is_self_reporting_name("TypeError"));
        assert!(!is_self_reporting_name("ProtocolActionError"));
    }

    #[test]
    fn invocation_errors_carry_the_foreign_name() {
        let err = CommandError::invocation("NightwatchAssertError", "expected visible");
        assert_eq!(err.name(), "NightwatchAssertError");
        assert!(err.is_self_reporting());

        let err = CommandError::invocation("TypeError", "undefined is not a function");
        assert!(!err.is_self_reporting());
    }

    #[test]
    fn protocol_errors_expose_their_stack_as_data() {
        let err = CommandError::ProtocolAction {
            status: -1,
            message: "no such element".into(),
            stack: Some("remote stack".into()),
        };
        let value = err.to_value();
        assert_eq!(value["name"], "ProtocolActionError");
        assert_eq!(value["stack"], "remote stack");
    }
}
