use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;

use crate::error::Result;

/// Sending half of a transport endpoint.
///
/// `send` only enqueues; it never waits for the peer. Dropping the value
/// releases the sending side, which the peer observes as the end of its
/// inbound stream.
pub trait Outbound: Send + Sync + 'static {
    /// Enqueue one message for delivery to the peer.
    fn send(&self, message: Bytes) -> Result<()>;
}

/// Boxed sending half.
pub type BoxOutbound = Box<dyn Outbound>;

/// Receiving half: one item per delivered message, in send order.
///
/// The stream ends when the peer releases its sending half. An `Err` item
/// is terminal.
pub type BoxInbound = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One endpoint of a linked pair.
pub trait Endpoint: Send + 'static {
    /// Separate the endpoint into its sending and receiving halves.
    ///
    /// Consumes the endpoint; on error the endpoint is released.
    fn split(self) -> Result<(BoxOutbound, BoxInbound)>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

