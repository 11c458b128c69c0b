use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{BoxInbound, BoxOutbound, Endpoint, Outbound};

/// In-process endpoint linked to exactly one peer.
///
/// Created in pairs by [`pair`]. Messages sent on one endpoint are received
/// on the other in send order.
#[derive(Debug)]
pub struct MemoryEndpoint {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Create two linked in-memory endpoints.
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let (a_tx, b_rx) = mpsc::unbounded_channel();
    let (b_tx, a_rx) = mpsc::unbounded_channel();
    (
        MemoryEndpoint { tx: a_tx, rx: a_rx },
        MemoryEndpoint { tx: b_tx, rx: b_rx },
    )
}

impl MemoryEndpoint {
    /// Enqueue a message for the peer.
    pub fn send(&self, message: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(message.into())
            .map_err(|_| TransportError::Closed)
    }

    /// Receive the next message from the peer.
    ///
    /// Returns `None` once the peer has released its sending half.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Endpoint for MemoryEndpoint {
    fn split(self) -> Result<(BoxOutbound, BoxInbound)> {
        Ok((
            Box::new(MemoryOutbound(self.tx)),
            Box::pin(MemoryInbound(self.rx)),
        ))
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryOutbound(mpsc::UnboundedSender<Bytes>);

impl Outbound for MemoryOutbound {
    fn send(&self, message: Bytes) -> Result<()> {
        let size = message.len();
        self.0.send(message).map_err(|_| TransportError::Closed)?;
        trace!(size, "memory message enqueued");
        Ok(())
    }
}

struct MemoryInbound(mpsc::UnboundedReceiver<Bytes>);

impl Stream for MemoryInbound {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx).map(|message| message.map(Ok))
    }
}
