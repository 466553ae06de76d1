//! The dynamic action-dispatch view handed to command instances.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use kestrel_core_types::ids::SessionId;
use kestrel_core_types::ProtocolResponse;

use crate::errors::DispatchError;
use crate::table::ActionTable;
use crate::transport::ActionRequest;

/// Completion callback applied to the raw protocol result. Returning `None`
/// (or an unusable `Null`) keeps the raw result as the resolved value.
pub type ActionCallback = Arc<dyn Fn(&ProtocolResponse) -> Option<Value> + Send + Sync>;

/// The identity convention: resolve to the raw protocol result.
pub fn identity_callback() -> ActionCallback {
    Arc::new(|response| Some(response.to_value()))
}

/// One positional argument of an action call. The legacy calling convention
/// allows a trailing callback in the argument list, so arguments are tagged
/// rather than raw JSON values.
#[derive(Clone)]
pub enum ActionArg {
    Value(Value),
    Callback(ActionCallback),
}

impl ActionArg {
    pub fn is_callback(&self) -> bool {
        matches!(self, ActionArg::Callback(_))
    }
}

impl From<Value> for ActionArg {
    fn from(value: Value) -> Self {
        ActionArg::Value(value)
    }
}

/// Read-only view of the owning client's current session, so the dispatcher
/// can stamp session-scoped requests without holding the whole client.
pub trait SessionView: Send + Sync {
    fn current_session_id(&self) -> Option<SessionId>;
}

/// Thin dispatch surface over the action table. Holds no state beyond the
/// table and the session view; one is constructed per command instance.
#[derive(Clone)]
pub struct TransportActions {
    table: Arc<ActionTable>,
    session: Arc<dyn SessionView>,
}

impl TransportActions {
    pub fn new(table: Arc<ActionTable>, session: Arc<dyn SessionView>) -> Self {
        Self { table, session }
    }

    pub fn table(&self) -> &ActionTable {
        &self.table
    }

    /// Resolves and executes one action by name.
    ///
    /// A trailing [`ActionArg::Callback`] is popped and used as the
    /// completion callback; otherwise the identity callback applies. Actions
    /// found in the session sub-table are stamped with the current session
    /// identifier before execution.
    pub async fn call(&self, name: &str, mut args: Vec<ActionArg>) -> Result<Value, DispatchError> {
        let callback = if matches!(args.last(), Some(ActionArg::Callback(_))) {
            match args.pop() {
                Some(ActionArg::Callback(callback)) => callback,
                _ => unreachable!("trailing argument checked above"),
            }
        } else {
            identity_callback()
        };

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                ActionArg::Value(value) => values.push(value),
                ActionArg::Callback(_) => {
                    return Err(DispatchError::MisplacedCallback(name.to_string()));
                }
            }
        }

        let (action, session_scoped) = self
            .table
            .lookup(name)
            .ok_or_else(|| DispatchError::UnknownAction(name.to_string()))?;

        let mut request = ActionRequest::new(name, values);
        if session_scoped {
            let session_id = self
                .session
                .current_session_id()
                .ok_or_else(|| DispatchError::MissingSession(name.to_string()))?;
            request = request.with_session(session_id);
        }

        debug!(
            action = name,
            session_scoped,
            "dispatching protocol action"
        );

        let response = action(request).await?;
        let resolved = callback(&response)
            .filter(|value| !value.is_null())
            .unwrap_or_else(|| response.to_value());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ActionFn;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedSession(Option<SessionId>);

    impl SessionView for FixedSession {
        fn current_session_id(&self) -> Option<SessionId> {
            self.0
        }
    }

    fn recording_action(log: Arc<Mutex<Vec<ActionRequest>>>, response: ProtocolResponse) -> ActionFn {
        Arc::new(move |request| {
            let log = Arc::clone(&log);
            let response = response.clone();
            Box::pin(async move {
                log.lock().unwrap().push(request);
                Ok(response)
            })
        })
    }

    fn dispatcher(
        session: Option<SessionId>,
        log: Arc<Mutex<Vec<ActionRequest>>>,
    ) -> TransportActions {
        let table = ActionTable::builder()
            .flat(
                "status",
                recording_action(Arc::clone(&log), ProtocolResponse::success(json!("ready"))),
            )
            .unwrap()
            .session(
                "find_element",
                recording_action(Arc::clone(&log), ProtocolResponse::success(json!({"ELEMENT": "e-1"}))),
            )
            .unwrap()
            .build();
        TransportActions::new(Arc::new(table), Arc::new(FixedSession(session)))
    }

    #[tokio::test]
    async fn flat_actions_are_never_session_stamped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(Some(SessionId::new()), Arc::clone(&log));

        actions.call("status", vec![]).await.unwrap();

        let requests = log.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].session_id.is_none());
    }

    #[tokio::test]
    async fn session_actions_are_always_stamped() {
        let session_id = SessionId::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(Some(session_id), Arc::clone(&log));

        actions
            .call("find_element", vec![json!("css selector").into()])
            .await
            .unwrap();

        let requests = log.lock().unwrap();
        assert_eq!(requests[0].session_id, Some(session_id));
        assert_eq!(requests[0].args, vec![json!("css selector")]);
    }

    #[tokio::test]
    async fn session_action_without_session_is_an_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let err = actions.call("find_element", vec![]).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingSession(name) if name == "find_element"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn trailing_callback_shapes_the_resolved_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let seen = Arc::new(Mutex::new(None));
        let seen_in_callback = Arc::clone(&seen);
        let callback: ActionCallback = Arc::new(move |response| {
            *seen_in_callback.lock().unwrap() = Some(response.clone());
            Some(json!({"shaped": response.value}))
        });

        let resolved = actions
            .call("status", vec![ActionArg::Callback(callback)])
            .await
            .unwrap();

        assert_eq!(resolved, json!({"shaped": "ready"}));
        let raw = seen.lock().unwrap().clone().expect("callback saw raw result");
        assert_eq!(raw.value, json!("ready"));
    }

    #[tokio::test]
    async fn without_callback_the_raw_result_is_resolved() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let resolved = actions.call("status", vec![]).await.unwrap();
        assert_eq!(resolved["status"], json!(0));
        assert_eq!(resolved["value"], json!("ready"));
    }

    #[tokio::test]
    async fn callback_returning_nothing_usable_keeps_the_raw_result() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let callback: ActionCallback = Arc::new(|_| None);
        let resolved = actions
            .call("status", vec![ActionArg::Callback(callback)])
            .await
            .unwrap();
        assert_eq!(resolved["value"], json!("ready"));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let err = actions.call("screenshot", vec![]).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownAction(name) if name == "screenshot"));
    }

    #[tokio::test]
    async fn misplaced_callback_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let actions = dispatcher(None, Arc::clone(&log));

        let args = vec![
            ActionArg::Callback(identity_callback()),
            ActionArg::Value(json!(1)),
        ];
        let err = actions.call("status", args).await.unwrap_err();
        assert!(matches!(err, DispatchError::MisplacedCallback(_)));
    }
}
