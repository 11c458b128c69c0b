//! Length-prefixed message framing for msgport byte-stream transports.
//!
//! Every message is framed with:
//! - A 2-byte magic number ("MP") for stream synchronization
//! - A 4-byte little-endian payload length
//!
//! [`FramedEndpoint`] wraps any `AsyncRead + AsyncWrite` stream (a Unix
//! socket, a TCP stream, an in-process duplex) into a transport endpoint,
//! so an `AsyncPort` can talk across process boundaries.

pub mod codec;
pub mod endpoint;
pub mod error;

pub use codec::{
    decode_message, encode_message, FrameConfig, MessageCodec, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use endpoint::FramedEndpoint;
pub use error::{FrameError, Result};
