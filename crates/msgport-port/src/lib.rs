//! Promise-style request/response over raw message endpoints.
//!
//! An [`AsyncPort`] wraps one transport endpoint and layers a small protocol
//! on top of it: correlated requests that resolve to a result or an error,
//! one-way notifications, per-request timeouts and cancellation, and a
//! close that rejects everything still outstanding.
//!
//! ```no_run
//! # async fn demo() -> msgport_port::Result<()> {
//! use msgport_port::AsyncChannel;
//! use serde_json::json;
//!
//! let channel = AsyncChannel::new()?;
//! channel.port2().on_request(|payload| async move {
//!     let a = payload["a"].as_i64().unwrap_or(0);
//!     let b = payload["b"].as_i64().unwrap_or(0);
//!     Ok(json!(a + b))
//! });
//!
//! let sum = channel.port1().request(json!({"op": "add", "a": 2, "b": 3})).await?;
//! assert_eq!(sum, json!(5));
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
mod pending;
pub mod port;

pub use channel::AsyncChannel;
pub use config::{PortConfig, RequestOptions, DEFAULT_MAX_PENDING};
pub use envelope::{Envelope, RemoteError, RequestId};
pub use error::{PortError, Result};
pub use handler::HandlerFuture;
pub use port::{AsyncPort, CancelHandle, PendingReply, PortBuilder, PortState};
