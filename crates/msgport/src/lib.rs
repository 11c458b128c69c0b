//! Promise-style request/response messaging over linked message ports.
//!
//! A raw message endpoint only moves opaque messages. msgport layers
//! correlated requests, one-way notifications, timeouts, cancellation and an
//! orderly close on top of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: raw endpoint abstraction and the in-memory linked pair
//! - [`frame`]: length-prefixed framing that turns byte streams into endpoints
//! - [`port`]: the request/response engine ([`AsyncPort`], [`AsyncChannel`])
//!
//! ```no_run
//! use msgport::{AsyncChannel, RemoteError};
//! use serde_json::json;
//!
//! # async fn demo() -> msgport::port::Result<()> {
//! let channel = AsyncChannel::new()?;
//! channel.port2().on_request(|payload| async move {
//!     match payload.as_i64() {
//!         Some(n) => Ok(json!(n + 1)),
//!         None => Err(RemoteError::new("expected a number")),
//!     }
//! });
//!
//! assert_eq!(channel.port1().request(json!(41)).await?, json!(42));
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use msgport_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgport_frame::*;
}

/// Re-export port types.
pub mod port {
    pub use msgport_port::*;
}

pub use msgport_port::{
    AsyncChannel, AsyncPort, CancelHandle, Envelope, PendingReply, PortBuilder, PortConfig,
    PortError, PortState, RemoteError, RequestOptions,
};
