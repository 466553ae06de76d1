//! The execution pipeline driving one command call end-to-end.
//!
//! Per invocation the pipeline walks a fixed state machine:
//! `Created → SelectorResolving → Invoking → (Succeeded | Failed) →
//! Reported → Done`. Selector resolution is never reordered relative to
//! invocation and a command is never invoked more than once per run. All
//! errors are intercepted at the pipeline boundary: future-based runs always
//! resolve, carrying the error as data when reporting is warranted;
//! signal-style runs route errors to the appropriate error channel and
//! yield the live handle instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use kestrel_core_types::ProtocolResponse;

use crate::client::Client;
use crate::definition::CommandDefinition;
use crate::errors::CommandError;
use crate::instance::{BuildOptions, CommandInstance};
use crate::report::RegisteredError;
use crate::resolver::{is_element_argument, ElementResolver};
use crate::signal::CompletionSignal;

/// Commands whose deprecated-protocol warning already fired this run.
static DEPRECATION_WARNED: Lazy<DashMap<String, ()>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Stage {
    SelectorResolving,
    Invoking,
    Failed,
    Reported,
    Done,
}

/// One call as handed down by the runner: positional arguments plus the
/// capturing stack trace for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct CommandCall {
    pub args: Vec<Value>,
    pub stack_trace: String,
}

impl CommandCall {
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            stack_trace: String::new(),
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = stack_trace.into();
        self
    }
}

/// What a pipeline run hands back: a resolved value for future-based
/// instances, or the live completion-signal handle for instances predating
/// the future contract. Callers pattern-match instead of inspecting types.
#[derive(Clone, Debug)]
pub enum CommandOutcome {
    Value(Value),
    Signal(CompletionSignal),
}

impl CommandOutcome {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            CommandOutcome::Value(value) => Some(value),
            CommandOutcome::Signal(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            CommandOutcome::Value(value) => Some(value),
            CommandOutcome::Signal(_) => None,
        }
    }

    pub fn signal(&self) -> Option<&CompletionSignal> {
        match self {
            CommandOutcome::Signal(signal) => Some(signal),
            CommandOutcome::Value(_) => None,
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, CommandOutcome::Signal(_))
    }
}

/// Per-invocation context. Downstream scheduling reads the async-user flag
/// from here; legacy-convention errors surface on the context error channel,
/// observed by the surrounding test section rather than the instance.
pub struct InvocationContext {
    async_user_command: AtomicBool,
    errors: CompletionSignal,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            async_user_command: AtomicBool::new(false),
            errors: CompletionSignal::default(),
        }
    }

    /// Whether the call being driven is an asynchronous user-defined
    /// command.
    pub fn is_async_user_command(&self) -> bool {
        self.async_user_command.load(Ordering::SeqCst)
    }

    fn mark_async_user_command(&self, value: bool) {
        self.async_user_command.store(value, Ordering::SeqCst);
    }

    /// The context-level error channel for the legacy completion-signal
    /// convention.
    pub fn errors(&self) -> &CompletionSignal {
        &self.errors
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-command-name factory produced by registration: one wrapper per
/// command, yielding one pipeline run per call.
pub struct CommandWrapper {
    name: String,
    file_name: Option<String>,
    definition: CommandDefinition,
    is_user_defined: bool,
}

impl CommandWrapper {
    pub fn create(
        name: impl Into<String>,
        definition: CommandDefinition,
        is_user_defined: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            file_name: None,
            definition,
            is_user_defined,
        })
    }

    /// Registers a command loaded from a source file; the file name is
    /// echoed on every instance built from this wrapper.
    pub fn create_from_file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        definition: CommandDefinition,
        is_user_defined: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            definition,
            is_user_defined,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn is_user_defined(&self) -> bool {
        self.is_user_defined
    }

    /// Drives one command call through the full state machine.
    ///
    /// The only error escaping this function is the construction-time
    /// interface violation; every later failure is intercepted, classified
    /// and folded into the outcome.
    #[instrument(skip_all, fields(command = %self.name))]
    pub async fn run(
        &self,
        client: Arc<Client>,
        resolver: Arc<dyn ElementResolver>,
        cx: &InvocationContext,
        call: CommandCall,
    ) -> Result<CommandOutcome, CommandError> {
        // Created
        let mut instance = CommandInstance::build(
            Arc::clone(&client),
            &self.definition,
            BuildOptions {
                command_name: self.name.clone(),
                file_name: self.file_name.clone(),
                args: call.args.clone(),
                stack_trace: call.stack_trace.clone(),
                is_user_defined: self.is_user_defined,
            },
        )?;

        // Promise-backed legacy failures belong to the surrounding test
        // section, not the instance.
        if instance.needs_promise() {
            instance.route_errors_to(cx.errors().clone());
        }

        if instance.meta().w3c_deprecated
            && DEPRECATION_WARNED.insert(self.name.clone(), ()).is_none()
        {
            warn!(
                command = %self.name,
                "command uses a deprecated protocol endpoint"
            );
        }

        let mut args = call.args;

        // SelectorResolving
        if !instance.meta().auto_invoke && is_element_argument(args.first()) {
            debug!(stage = ?Stage::SelectorResolving, "resolving selector argument");
            match resolver.resolve(&args).await {
                Ok(Some(element)) => {
                    args[0] = element.as_value();
                }
                Ok(None) => {}
                Err(err) => {
                    return Ok(self.failed(&instance, &client, err, &call.stack_trace));
                }
            }
        }

        // Invoking
        cx.mark_async_user_command(instance.is_async_command() && instance.is_user_defined());
        debug!(
            stage = ?Stage::Invoking,
            invocation = %instance.invocation_id(),
            "invoking command"
        );
        match instance.invoke(args).await {
            Ok(value) => Ok(self.succeeded(&instance, &client, value)),
            Err(err) => Ok(self.failed(&instance, &client, err, &call.stack_trace)),
        }
    }

    fn failed(
        &self,
        instance: &CommandInstance,
        client: &Arc<Client>,
        err: CommandError,
        stack_trace: &str,
    ) -> CommandOutcome {
        debug!(stage = ?Stage::Failed, error = %err, "command failed");

        if instance.is_signal_style() {
            // Legacy convention: the error is observed through a channel,
            // not classified further, and the run produces no value.
            instance.error_channel().emit_error(err.to_string());
            return CommandOutcome::Signal(instance.signal());
        }

        if err.is_self_reporting() {
            debug!(name = err.name(), "error already reported at its source");
        } else {
            RegisteredError::new(err.clone()).register(client.reporter().as_ref());
            debug!(stage = ?Stage::Reported, "failure registered");
        }

        let mut value = err.to_value();
        if value.get("stack").is_none() && !stack_trace.is_empty() {
            value["stack"] = json!(stack_trace);
        }
        CommandOutcome::Value(value)
    }

    fn succeeded(
        &self,
        instance: &CommandInstance,
        client: &Arc<Client>,
        value: Value,
    ) -> CommandOutcome {
        if let Some(response) = ProtocolResponse::from_value(&value) {
            if response.is_failure() {
                self.report_protocol_failure(instance, client, &response);
            }
        }

        debug!(stage = ?Stage::Done, "command finished");
        if instance.is_signal_style() {
            CommandOutcome::Signal(instance.signal())
        } else {
            // Protocol-level failure above was reported, not raised: the
            // original result is still the outcome.
            CommandOutcome::Value(value)
        }
    }

    fn report_protocol_failure(
        &self,
        instance: &CommandInstance,
        client: &Arc<Client>,
        response: &ProtocolResponse,
    ) {
        let settings = client.settings();
        let err = if response.is_network_error() {
            if !settings.report_network_errors {
                return;
            }
            CommandError::Network {
                code: response.code.clone().unwrap_or_default(),
                message: response.error_message().to_string(),
            }
        } else {
            if !settings.report_command_errors || !instance.report_protocol_errors(response) {
                return;
            }
            CommandError::ProtocolAction {
                status: response.status,
                message: response.error_message().to_string(),
                stack: response.stack.clone(),
            }
        };

        debug!(stage = ?Stage::Reported, name = err.name(), "protocol failure registered");
        RegisteredError::new(err).register(client.reporter().as_ref());
    }
}
