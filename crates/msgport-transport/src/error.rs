/// Errors that can occur in message transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer endpoint is gone or the local half was released.
    #[error("transport closed")]
    Closed,

    /// An I/O error occurred on an underlying byte stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message exceeds what the endpoint will carry.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The inbound byte stream could not be split into messages.
    #[error("malformed inbound stream: {0}")]
    Malformed(String),

    /// The endpoint needs a running async runtime to start its I/O tasks.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
