//! The consumed wire-transport contract and its test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kestrel_core_types::ids::SessionId;
use kestrel_core_types::ProtocolResponse;

use crate::errors::TransportError;

/// One protocol action request, constructed immediately before delegating to
/// the transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    pub args: Vec<Value>,
    pub session_id: Option<SessionId>,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// Metadata of the underlying driver handle exposed to command instances.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DriverInfo {
    pub browser_name: String,
    pub headless: bool,
}

/// Wire transport to the remote automation endpoint. Supplied by the
/// embedding runner; this crate only consumes it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn run_protocol_action(
        &self,
        request: ActionRequest,
    ) -> Result<ProtocolResponse, TransportError>;

    fn driver(&self) -> DriverInfo;
}

/// Transport placeholder that refuses every action.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn run_protocol_action(
        &self,
        request: ActionRequest,
    ) -> Result<ProtocolResponse, TransportError> {
        Err(TransportError::Unavailable(format!(
            "transport not available for action {}",
            request.name
        )))
    }

    fn driver(&self) -> DriverInfo {
        DriverInfo::default()
    }
}

/// In-memory transport returning canned responses, for tests and dry runs.
/// Every request it serves is recorded and can be inspected afterwards.
pub struct StaticTransport {
    responses: Mutex<HashMap<String, ProtocolResponse>>,
    fallback: ProtocolResponse,
    requests: Mutex<Vec<ActionRequest>>,
    driver: DriverInfo,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fallback: ProtocolResponse::success(Value::Null),
            requests: Mutex::new(Vec::new()),
            driver: DriverInfo {
                browser_name: "static".into(),
                headless: true,
            },
        }
    }

    pub fn with_response(self, action: impl Into<String>, response: ProtocolResponse) -> Self {
        self.responses
            .lock()
            .expect("responses lock")
            .insert(action.into(), response);
        self
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl Default for StaticTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn run_protocol_action(
        &self,
        request: ActionRequest,
    ) -> Result<ProtocolResponse, TransportError> {
        let response = self
            .responses
            .lock()
            .expect("responses lock")
            .get(&request.name)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());
        self.requests.lock().expect("requests lock").push(request);
        Ok(response)
    }

    fn driver(&self) -> DriverInfo {
        self.driver.clone()
    }
}
