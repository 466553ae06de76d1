//! Error types for transport dispatch.

use thiserror::Error;

/// Errors raised by the wire transport itself.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// The transport could not reach the remote endpoint.
    #[error("connection failed ({code}): {message}")]
    Connection { code: String, message: String },

    /// The remote endpoint closed or never answered.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// Internal transport error (should not happen in normal operation).
    #[error("internal transport error: {0}")]
    Internal(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connection { .. } | TransportError::Unavailable(_)
        )
    }
}

/// Errors raised while resolving and executing one action call.
#[derive(Debug, Error, Clone)]
pub enum DispatchError {
    /// The action name is not present in either table.
    #[error("unknown protocol action `{0}`")]
    UnknownAction(String),

    /// A session-scoped action was called without an active session.
    #[error("action `{0}` requires an active session")]
    MissingSession(String),

    /// A callback argument appeared anywhere but the trailing position.
    #[error("callback argument for `{0}` must be the last argument")]
    MisplacedCallback(String),

    /// An action name was registered twice while building the table.
    #[error("duplicate protocol action `{0}`")]
    DuplicateAction(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
