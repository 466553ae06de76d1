//! Command normalization, instance construction and the execution pipeline
//! of the kestrel runner.
//!
//! Three historical command-authoring styles feed this crate: plain
//! functions, legacy objects exposing a `command` member, and definitions
//! that already conform to the uniform contract. The normalizer folds them
//! into one invocation contract, the builder produces one short-lived
//! instance per call, and the pipeline drives selector resolution,
//! invocation, failure classification and result shaping so that every
//! failure is reported exactly once and future-based callers never observe a
//! rejection.

pub mod api;
pub mod client;
pub mod definition;
pub mod errors;
pub mod instance;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod signal;

pub use api::ApiSurface;
pub use client::{Client, RunOptions, Settings};
pub use definition::{
    adapt, classify, CommandDefinition, CommandFn, CommandFuture, CompleteFn, DefinitionMeta,
    LegacyDefinition, UniformCommand, Variant,
};
pub use errors::CommandError;
pub use instance::{BuildOptions, CommandContext, CommandInstance};
pub use pipeline::{CommandCall, CommandOutcome, CommandWrapper, InvocationContext};
pub use report::{NullReporter, RegisteredError, Reporter};
pub use resolver::{is_element_argument, ElementResolver, ElementResult, NoopResolver};
pub use signal::{CompletionSignal, SignalEvent};
