//! The enumerable protocol action table.
//!
//! Actions are registered once at construction time; there is no open-ended
//! reflective surface. The table carries one flat map of browser-level
//! actions and one nested sub-table of session-scoped actions, matching the
//! reserved `session` key of the consumed action set.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use kestrel_core_types::ProtocolResponse;

use crate::errors::{DispatchError, TransportError};
use crate::transport::{ActionRequest, Transport};

/// One executable protocol action.
pub type ActionFn = Arc<
    dyn Fn(ActionRequest) -> BoxFuture<'static, Result<ProtocolResponse, TransportError>>
        + Send
        + Sync,
>;

/// Builds an [`ActionFn`] that forwards the request to a transport under a
/// fixed protocol method name. This is how the standard action set is wired
/// over a concrete transport.
pub fn protocol_action(transport: Arc<dyn Transport>, method: &str) -> ActionFn {
    let method = method.to_string();
    Arc::new(move |mut request: ActionRequest| {
        let transport = Arc::clone(&transport);
        request.name = method.clone();
        Box::pin(async move { transport.run_protocol_action(request).await })
    })
}

pub struct ActionTable {
    flat: HashMap<String, ActionFn>,
    session: HashMap<String, ActionFn>,
}

impl ActionTable {
    pub fn builder() -> ActionTableBuilder {
        ActionTableBuilder::default()
    }

    /// Looks an action up by name. Session-scoped entries shadow flat ones,
    /// matching the routing rule of the dispatcher. The second element tells
    /// whether the entry is session-scoped.
    pub fn lookup(&self, name: &str) -> Option<(ActionFn, bool)> {
        if let Some(action) = self.session.get(name) {
            return Some((Arc::clone(action), true));
        }
        self.flat.get(name).map(|action| (Arc::clone(action), false))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.session.contains_key(name) || self.flat.contains_key(name)
    }

    /// Every registered action name, sorted, session-scoped ones included.
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .flat
            .keys()
            .chain(self.session.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.flat.len() + self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flat.is_empty() && self.session.is_empty()
    }
}

#[derive(Default)]
pub struct ActionTableBuilder {
    flat: HashMap<String, ActionFn>,
    session: HashMap<String, ActionFn>,
}

impl ActionTableBuilder {
    /// Registers a browser-level action.
    pub fn flat(
        mut self,
        name: impl Into<String>,
        action: ActionFn,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        if self.flat.contains_key(&name) || self.session.contains_key(&name) {
            return Err(DispatchError::DuplicateAction(name));
        }
        self.flat.insert(name, action);
        Ok(self)
    }

    /// Registers a session-scoped action.
    pub fn session(
        mut self,
        name: impl Into<String>,
        action: ActionFn,
    ) -> Result<Self, DispatchError> {
        let name = name.into();
        if self.session.contains_key(&name) || self.flat.contains_key(&name) {
            return Err(DispatchError::DuplicateAction(name));
        }
        self.session.insert(name, action);
        Ok(self)
    }

    pub fn build(self) -> ActionTable {
        ActionTable {
            flat: self.flat,
            session: self.session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StaticTransport;
    use serde_json::{json, Value};

    fn stub_action() -> ActionFn {
        Arc::new(|_request| Box::pin(async { Ok(ProtocolResponse::success(Value::Null)) }))
    }

    #[test]
    fn rejects_duplicate_names_across_both_tables() {
        let builder = ActionTable::builder()
            .flat("navigate_to", stub_action())
            .unwrap();
        let err = builder
            .session("navigate_to", stub_action())
            .err()
            .expect("duplicate name must be rejected");
        assert!(matches!(err, DispatchError::DuplicateAction(name) if name == "navigate_to"));
    }

    #[test]
    fn enumerates_registered_actions() {
        let table = ActionTable::builder()
            .flat("status", stub_action())
            .unwrap()
            .session("find_element", stub_action())
            .unwrap()
            .build();
        assert_eq!(table.action_names(), vec!["find_element", "status"]);
        assert!(table.contains("find_element"));
        assert!(!table.contains("screenshot"));
    }

    #[test]
    fn lookup_reports_session_scope() {
        let table = ActionTable::builder()
            .flat("status", stub_action())
            .unwrap()
            .session("find_element", stub_action())
            .unwrap()
            .build();
        let (_, scoped) = table.lookup("find_element").expect("registered");
        assert!(scoped);
        let (_, scoped) = table.lookup("status").expect("registered");
        assert!(!scoped);
        assert!(table.lookup("missing").is_none());
    }

    #[tokio::test]
    async fn protocol_actions_delegate_to_the_transport() {
        let transport = Arc::new(StaticTransport::new().with_response(
            "current_url",
            ProtocolResponse::success(json!("https://example.com")),
        ));
        let action = protocol_action(Arc::clone(&transport) as Arc<dyn Transport>, "current_url");

        let response = action(ActionRequest::new("url", vec![])).await.unwrap();
        assert_eq!(response.value, json!("https://example.com"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "current_url");
    }
}
