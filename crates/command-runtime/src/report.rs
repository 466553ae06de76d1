//! Register-once error reporting glue.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::error;

use crate::errors::CommandError;

/// Failure sink of the active test. Supplied by the reporting layer; this
/// crate only consumes it.
pub trait Reporter: Send + Sync {
    fn register_test_error(&self, error: &CommandError);
}

/// Reporter that discards everything.
#[derive(Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn register_test_error(&self, _error: &CommandError) {}
}

/// An error carrying its own "already registered" marker. Once registered,
/// no component downstream may log or register it again.
pub struct RegisteredError {
    error: CommandError,
    registered: AtomicBool,
}

impl RegisteredError {
    pub fn new(error: CommandError) -> Self {
        Self {
            error,
            registered: AtomicBool::new(false),
        }
    }

    pub fn error(&self) -> &CommandError {
        &self.error
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Logs the error and registers it against the active test, at most once
    /// no matter how many classification passes see it. Returns whether this
    /// call performed the registration.
    pub fn register(&self, reporter: &dyn Reporter) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            return false;
        }
        error!(target: "command-runtime", error = %self.error, "command failure");
        reporter.register_test_error(&self.error);
        true
    }
}
