//! Per-invocation command instances.
//!
//! One instance is built fresh for every call and is never reused: its
//! lifetime is bounded to a single invocation. The instance borrows the
//! long-lived client and owns none of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use kestrel_core_types::ids::InvocationId;
use kestrel_core_types::ProtocolResponse;
use transport_dispatch::{DriverInfo, TransportActions};

use crate::api::ApiSurface;
use crate::client::Client;
use crate::definition::{
    adapt, classify, CommandDefinition, CompleteFn, DefinitionMeta, FunctionAdapter,
    UniformCommand, Variant,
};
use crate::errors::CommandError;
use crate::signal::CompletionSignal;

/// Build-time options for one invocation.
#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub command_name: String,
    pub file_name: Option<String>,
    pub args: Vec<Value>,
    pub stack_trace: String,
    pub is_user_defined: bool,
}

/// Contextual accessors handed to the command body.
#[derive(Clone)]
pub struct CommandContext {
    client: Arc<Client>,
    signal: CompletionSignal,
    errors: CompletionSignal,
    complete_override: Option<CompleteFn>,
}

impl CommandContext {
    pub fn api(&self) -> Arc<ApiSurface> {
        self.client.api()
    }

    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    pub fn driver(&self) -> DriverInfo {
        self.client.driver()
    }

    pub fn transport_actions(&self) -> TransportActions {
        self.client.transport_actions()
    }

    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// The channel failures of this invocation are observed on. For the
    /// promise-backed legacy convention this is the invocation-context
    /// channel; otherwise the instance's own signal.
    pub fn errors(&self) -> &CompletionSignal {
        &self.errors
    }

    /// Runs the definition's own `complete` hook when it supplies one,
    /// otherwise emits a `complete` signal carrying the same arguments.
    pub fn complete(&self, args: Vec<Value>) {
        match &self.complete_override {
            Some(complete) => complete(args),
            None => self.signal.emit_complete(args),
        }
    }

    /// JSON descriptor of the api context, the synthesized result of the
    /// legacy synchronous convention.
    pub fn as_value(&self) -> Value {
        json!({
            "session_id": self.client.session_id().map(|id| id.to_string()),
            "driver": self.client.driver().browser_name,
        })
    }
}

/// One short-lived adapter instance per invocation.
pub struct CommandInstance {
    id: InvocationId,
    name: String,
    file_name: Option<String>,
    args: Vec<Value>,
    stack_trace: String,
    needs_promise: bool,
    is_async_command: bool,
    is_user_defined: bool,
    meta: DefinitionMeta,
    command: Arc<dyn UniformCommand>,
    client: Arc<Client>,
    signal: CompletionSignal,
    error_channel: Option<CompletionSignal>,
    invoked: AtomicBool,
}

impl CommandInstance {
    /// Normalizes the definition and wires the instance. Fails with an
    /// interface violation, synchronously, when no callable `command`
    /// member survives normalization.
    pub fn build(
        client: Arc<Client>,
        definition: &CommandDefinition,
        options: BuildOptions,
    ) -> Result<Self, CommandError> {
        let variant = classify(definition);
        let command: Arc<dyn UniformCommand> = match definition {
            CommandDefinition::Function(function) => {
                Arc::new(FunctionAdapter::new(Arc::clone(function)))
            }
            CommandDefinition::LegacyObject(legacy) => match adapt(legacy) {
                Some(adapter) => Arc::new(adapter),
                None => {
                    return Err(CommandError::InterfaceViolation {
                        command: options.command_name,
                    });
                }
            },
            CommandDefinition::Adapter(uniform) => Arc::clone(uniform),
        };

        let meta = command.meta();
        Ok(Self {
            id: InvocationId::new(),
            name: options.command_name,
            file_name: options.file_name,
            args: options.args,
            stack_trace: options.stack_trace,
            needs_promise: variant == Variant::LegacyObject,
            is_async_command: meta.is_async,
            is_user_defined: options.is_user_defined,
            meta,
            command,
            client,
            signal: CompletionSignal::default(),
            error_channel: None,
            invoked: AtomicBool::new(false),
        })
    }

    pub fn invocation_id(&self) -> InvocationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source file the definition was loaded from, when the loader
    /// supplies one. Falls back to the command name.
    pub fn command_file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.name)
    }

    pub fn command_args(&self) -> &[Value] {
        &self.args
    }

    pub fn stack_trace(&self) -> &str {
        &self.stack_trace
    }

    pub fn meta(&self) -> DefinitionMeta {
        self.meta
    }

    /// The underlying command follows the legacy completion-signal
    /// convention.
    pub fn needs_promise(&self) -> bool {
        self.needs_promise
    }

    pub fn is_async_command(&self) -> bool {
        self.is_async_command
    }

    pub fn is_user_defined(&self) -> bool {
        self.is_user_defined
    }

    /// The command model predates the future-based contract: callers attach
    /// listeners to the instance's signal instead of awaiting a value.
    pub fn is_signal_style(&self) -> bool {
        !self.is_async_command
    }

    pub fn api(&self) -> Arc<ApiSurface> {
        self.client.api()
    }

    pub fn client(&self) -> Arc<Client> {
        Arc::clone(&self.client)
    }

    pub fn driver(&self) -> DriverInfo {
        self.client.driver()
    }

    pub fn transport_actions(&self) -> TransportActions {
        self.client.transport_actions()
    }

    /// Derived from run configuration: explicit CLI override first, else
    /// the global setting.
    pub fn reuse_browser(&self) -> bool {
        self.client.reuse_browser()
    }

    pub fn signal(&self) -> CompletionSignal {
        self.signal.clone()
    }

    /// Routes this invocation's failures to an external channel instead of
    /// the instance signal. The pipeline points promise-backed legacy
    /// instances at the invocation-context error channel.
    pub fn route_errors_to(&mut self, channel: CompletionSignal) {
        self.error_channel = Some(channel);
    }

    /// The effective error channel. See [`Self::route_errors_to`].
    pub fn error_channel(&self) -> CompletionSignal {
        self.error_channel
            .clone()
            .unwrap_or_else(|| self.signal.clone())
    }

    /// User-defined commands always report protocol errors; built-ins defer
    /// to the definition's own base policy.
    pub fn report_protocol_errors(&self, response: &ProtocolResponse) -> bool {
        if self.is_user_defined {
            return true;
        }
        self.command.report_protocol_errors(response)
    }

    /// The `complete` lifecycle hook.
    pub fn complete(&self, args: Vec<Value>) {
        match self.command.complete_override() {
            Some(complete) => complete(args),
            None => self.signal.emit_complete(args),
        }
    }

    pub(crate) fn context(&self) -> CommandContext {
        CommandContext {
            client: Arc::clone(&self.client),
            signal: self.signal.clone(),
            errors: self.error_channel(),
            complete_override: self.command.complete_override(),
        }
    }

    /// Invokes the normalized command. An instance is single-use; a second
    /// invocation fails without reaching the command.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value, CommandError> {
        if self.invoked.swap(true, Ordering::SeqCst) {
            return Err(CommandError::AlreadyInvoked {
                command: self.name.clone(),
            });
        }
        self.command.command(self.context(), args).await
    }
}
