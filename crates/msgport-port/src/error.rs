use std::time::Duration;

use crate::envelope::RemoteError;

/// Errors surfaced by port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The peer's handler reported a failure.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// No response arrived within the request deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller withdrew the request.
    #[error("request cancelled")]
    Cancelled,

    /// The port closed before the operation could complete.
    #[error("port closed")]
    Closed,

    /// The underlying transport refused the message.
    #[error("transport error: {0}")]
    Transport(#[from] msgport_transport::TransportError),

    /// The pending-request table is full.
    #[error("too many pending requests (limit {limit})")]
    TooManyPending { limit: usize },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ports are driven by tokio and must be opened inside a runtime.
    #[error("no tokio runtime available to drive the port")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, PortError>;
