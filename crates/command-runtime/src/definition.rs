//! Command definition normalization.
//!
//! Three authoring styles reach the runtime: plain functions, legacy objects
//! exposing a `command` member, and definitions already written against the
//! uniform contract. Classification is one explicit function over a closed
//! set of variants; new shapes extend the enumeration rather than adding
//! shape checks at call sites. The normalizer never mutates a definition in
//! place: it passes it through or wraps it in a synthesized adapter built by
//! composition.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use kestrel_core_types::ProtocolResponse;

use crate::errors::CommandError;
use crate::instance::CommandContext;

pub type CommandFuture = BoxFuture<'static, Result<Value, CommandError>>;

/// The uniform invocation shape every variant normalizes to.
pub type CommandFn = Arc<dyn Fn(CommandContext, Vec<Value>) -> CommandFuture + Send + Sync>;

/// Override for the `complete` lifecycle hook.
pub type CompleteFn = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// Definition metadata shared by all variants.
#[derive(Clone, Copy, Debug)]
pub struct DefinitionMeta {
    /// Whether the effective command implementation is asynchronous by
    /// nature. Synchronous legacy commands predate the future-based
    /// contract and complete through the signal convention instead.
    pub is_async: bool,
    /// Skip element-selector resolution entirely for this command.
    pub auto_invoke: bool,
    /// Command relies on a deprecated protocol endpoint; warned once,
    /// never blocked.
    pub w3c_deprecated: bool,
    /// Base protocol-error reporting policy for built-in commands.
    pub report_protocol_errors: bool,
}

impl Default for DefinitionMeta {
    fn default() -> Self {
        Self {
            is_async: true,
            auto_invoke: false,
            w3c_deprecated: false,
            report_protocol_errors: true,
        }
    }
}

/// A legacy object-style definition: a non-callable object whose `command`
/// member is the callable. The member may be absent, in which case the
/// definition fails the interface check at build time.
#[derive(Clone, Default)]
pub struct LegacyDefinition {
    pub command: Option<CommandFn>,
    pub complete: Option<CompleteFn>,
    pub meta: DefinitionMeta,
}

/// A definition already conforming to the uniform contract.
#[async_trait]
pub trait UniformCommand: Send + Sync {
    async fn command(&self, ctx: CommandContext, args: Vec<Value>) -> Result<Value, CommandError>;

    fn meta(&self) -> DefinitionMeta {
        DefinitionMeta::default()
    }

    /// Base protocol-error reporting policy. User-defined commands bypass
    /// this and always report.
    fn report_protocol_errors(&self, response: &ProtocolResponse) -> bool {
        let _ = response;
        true
    }

    /// Optional override for the `complete` lifecycle hook. Without one the
    /// instance emits a `complete` signal carrying the same arguments.
    fn complete_override(&self) -> Option<CompleteFn> {
        None
    }
}

/// The closed set of definition variants.
pub enum CommandDefinition {
    /// A callable invoked directly.
    Function(CommandFn),
    /// Legacy object style, detected structurally by its `command` member.
    LegacyObject(LegacyDefinition),
    /// Already uniform, optionally overriding lifecycle hooks.
    Adapter(Arc<dyn UniformCommand>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Variant {
    Function,
    LegacyObject,
    Adapter,
}

/// The single classification point. A definition is legacy object-style iff
/// it is an object shape whose `command` member is callable; an object shape
/// without one is treated as already-uniform and left for the builder's
/// interface check to reject.
pub fn classify(definition: &CommandDefinition) -> Variant {
    match definition {
        CommandDefinition::Function(_) => Variant::Function,
        CommandDefinition::LegacyObject(legacy) if legacy.command.is_some() => Variant::LegacyObject,
        CommandDefinition::LegacyObject(_) => Variant::Adapter,
        CommandDefinition::Adapter(_) => Variant::Adapter,
    }
}

/// Wraps a function-style definition in the uniform contract.
pub(crate) struct FunctionAdapter {
    inner: CommandFn,
}

impl FunctionAdapter {
    pub(crate) fn new(inner: CommandFn) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl UniformCommand for FunctionAdapter {
    async fn command(&self, ctx: CommandContext, args: Vec<Value>) -> Result<Value, CommandError> {
        (self.inner)(ctx, args).await
    }
}

/// Synthesized adapter for legacy object-style definitions. Holds the
/// original callable by composition; the unknown user shape is never
/// extended.
pub struct LegacyAdapter {
    inner: CommandFn,
    complete: Option<CompleteFn>,
    meta: DefinitionMeta,
}

/// Synthesizes the uniform adapter for a legacy definition. Returns `None`
/// when the `command` member is absent.
pub fn adapt(definition: &LegacyDefinition) -> Option<LegacyAdapter> {
    let inner = definition.command.clone()?;
    Some(LegacyAdapter {
        inner,
        complete: definition.complete.clone(),
        meta: definition.meta,
    })
}

#[async_trait]
impl UniformCommand for LegacyAdapter {
    async fn command(&self, ctx: CommandContext, args: Vec<Value>) -> Result<Value, CommandError> {
        if self.meta.is_async {
            return (self.inner)(ctx, args).await;
        }

        // Legacy synchronous convention: the callable runs on the next tick
        // of the run loop, never within the calling turn, and the api
        // context stands in for the missing future.
        let inner = Arc::clone(&self.inner);
        let deferred = ctx.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            match (inner)(deferred.clone(), args).await {
                Ok(value) => deferred.complete(vec![value]),
                Err(err) => {
                    debug!(target: "command-runtime", error = %err, "deferred legacy command failed");
                    deferred.errors().emit_error(err.to_string());
                }
            }
        });
        Ok(ctx.as_value())
    }

    fn meta(&self) -> DefinitionMeta {
        self.meta
    }

    fn report_protocol_errors(&self, _response: &ProtocolResponse) -> bool {
        self.meta.report_protocol_errors
    }

    fn complete_override(&self) -> Option<CompleteFn> {
        self.complete.clone()
    }
}
