//! The long-lived client/session object shared by all command instances.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use kestrel_core_types::ids::SessionId;
use transport_dispatch::{ActionTable, DriverInfo, SessionView, Transport, TransportActions};

use crate::api::ApiSurface;
use crate::report::Reporter;

/// Run settings consumed by the pipeline. Loaded elsewhere; this core only
/// reads them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub report_command_errors: bool,
    pub report_network_errors: bool,
    pub reuse_browser: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            report_command_errors: true,
            report_network_errors: true,
            reuse_browser: false,
        }
    }
}

/// Per-run overrides coming from the command line. An explicit override
/// wins over the global setting.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    pub reuse_browser: Option<bool>,
}

/// Owning client of a test session. Shared, read-mostly; only the active
/// session identifier is written during a run, last-write-wins from the
/// single cooperative thread.
pub struct Client {
    api: Arc<ApiSurface>,
    transport: Arc<dyn Transport>,
    actions: Arc<ActionTable>,
    settings: Settings,
    run_options: RunOptions,
    reporter: Arc<dyn Reporter>,
    session_id: RwLock<Option<SessionId>>,
}

impl Client {
    pub fn new(
        transport: Arc<dyn Transport>,
        actions: Arc<ActionTable>,
        settings: Settings,
        run_options: RunOptions,
        reporter: Arc<dyn Reporter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            api: Arc::new(ApiSurface::new()),
            transport,
            actions,
            settings,
            run_options,
            reporter,
            session_id: RwLock::new(None),
        })
    }

    pub fn api(&self) -> Arc<ApiSurface> {
        Arc::clone(&self.api)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn driver(&self) -> DriverInfo {
        self.transport.driver()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reporter(&self) -> Arc<dyn Reporter> {
        Arc::clone(&self.reporter)
    }

    /// Explicit CLI override first, else the global setting.
    pub fn reuse_browser(&self) -> bool {
        self.run_options
            .reuse_browser
            .unwrap_or(self.settings.reuse_browser)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        *self.session_id.read().expect("session id lock")
    }

    pub fn set_session_id(&self, session_id: Option<SessionId>) {
        *self.session_id.write().expect("session id lock") = session_id;
    }

    /// The session-aware action-dispatch view handed to command instances.
    pub fn transport_actions(self: &Arc<Self>) -> TransportActions {
        TransportActions::new(
            Arc::clone(&self.actions),
            Arc::clone(self) as Arc<dyn SessionView>,
        )
    }
}

impl SessionView for Client {
    fn current_session_id(&self) -> Option<SessionId> {
        self.session_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;
    use transport_dispatch::NoopTransport;

    fn client(settings: Settings, run_options: RunOptions) -> Arc<Client> {
        Client::new(
            Arc::new(NoopTransport),
            Arc::new(ActionTable::builder().build()),
            settings,
            run_options,
            Arc::new(NullReporter),
        )
    }

    #[test]
    fn cli_override_wins_over_the_global_setting() {
        let global = Settings {
            reuse_browser: true,
            ..Default::default()
        };
        assert!(client(global, RunOptions::default()).reuse_browser());
        assert!(!client(
            global,
            RunOptions {
                reuse_browser: Some(false),
            }
        )
        .reuse_browser());
    }

    #[test]
    fn session_id_is_last_write_wins() {
        let client = client(Settings::default(), RunOptions::default());
        assert!(client.session_id().is_none());

        let first = SessionId::new();
        let second = SessionId::new();
        client.set_session_id(Some(first));
        client.set_session_id(Some(second));
        assert_eq!(client.session_id(), Some(second));
    }
}
