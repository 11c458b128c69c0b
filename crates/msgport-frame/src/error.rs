/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4d50 \"MP\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;

impl From<FrameError> for msgport_transport::TransportError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => Self::Io(io),
            FrameError::PayloadTooLarge { size, max } => Self::MessageTooLarge { size, max },
            other => Self::Malformed(other.to_string()),
        }
    }
}
