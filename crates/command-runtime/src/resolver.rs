//! Consumed element-selector resolver contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::CommandError;

/// A resolved element reference ready to replace a selector argument.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElementResult {
    pub element_id: String,
}

impl ElementResult {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
        }
    }

    /// The wire shape written back into argument 0.
    pub fn as_value(&self) -> Value {
        json!({ "ELEMENT": self.element_id })
    }
}

/// External resolver rewriting selector arguments into element references.
/// Resolution is asynchronous and may fail; the pipeline treats a failure
/// exactly like an invocation failure.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    async fn resolve(&self, args: &[Value]) -> Result<Option<ElementResult>, CommandError>;
}

/// Resolver that never yields an element.
#[derive(Default)]
pub struct NoopResolver;

#[async_trait]
impl ElementResolver for NoopResolver {
    async fn resolve(&self, _args: &[Value]) -> Result<Option<ElementResult>, CommandError> {
        Ok(None)
    }
}

/// Whether an argument is element-typed, i.e. a candidate for selector
/// resolution: an object carrying a `selector` member.
pub fn is_element_argument(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_object)
        .map(|object| object.contains_key("selector"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_selector_objects_are_element_typed() {
        assert!(is_element_argument(Some(&json!({"selector": "#submit"}))));
        assert!(!is_element_argument(Some(&json!(21))));
        assert!(!is_element_argument(Some(&json!("css selector"))));
        assert!(!is_element_argument(Some(&json!({"ELEMENT": "e-1"}))));
        assert!(!is_element_argument(None));
    }
}
