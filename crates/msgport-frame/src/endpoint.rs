use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use msgport_transport::{BoxInbound, BoxOutbound, Endpoint, Outbound, TransportError};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{FrameConfig, MessageCodec};

/// Transport endpoint over a framed byte stream.
///
/// Splitting the endpoint spawns one writer task on the current tokio
/// runtime. Sends are queued to that task, so [`Outbound::send`] never
/// waits on the socket. Releasing the outbound half flushes the queue and
/// shuts down the write side of the stream.
pub struct FramedEndpoint<T> {
    io: T,
    config: FrameConfig,
    write_closed: CancellationToken,
}

impl<T> FramedEndpoint<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a stream with default frame configuration.
    pub fn new(io: T) -> Self {
        Self::with_config(io, FrameConfig::default())
    }

    /// Wrap a stream with explicit frame configuration.
    pub fn with_config(io: T, config: FrameConfig) -> Self {
        Self {
            io,
            config,
            write_closed: CancellationToken::new(),
        }
    }

    /// Current frame configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Token cancelled once the writer task has stopped: every queued
    /// frame is written and the write side shut down, or a write failed.
    ///
    /// Short-lived clients await it after releasing the endpoint so the
    /// process does not exit with frames still queued.
    pub fn write_closed(&self) -> CancellationToken {
        self.write_closed.clone()
    }
}

impl<T> Endpoint for FramedEndpoint<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    fn split(self) -> msgport_transport::Result<(BoxOutbound, BoxInbound)> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError::NoRuntime(err.to_string()))?;

        let max = self.config.max_payload_size;
        let (read_half, write_half) = tokio::io::split(self.io);

        let inbound = FramedRead::new(read_half, MessageCodec::new(max))
            .map(|item| item.map_err(TransportError::from));

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = FramedWrite::new(write_half, MessageCodec::new(max));
        let done = self.write_closed;
        runtime.spawn(async move {
            write_loop(writer, rx).await;
            done.cancel();
        });

        Ok((Box::new(FramedOutbound { tx, max }), Box::pin(inbound)))
    }

    fn transport_name(&self) -> &'static str {
        "framed-stream"
    }
}

struct FramedOutbound {
    tx: mpsc::UnboundedSender<Bytes>,
    max: usize,
}

impl Outbound for FramedOutbound {
    fn send(&self, message: Bytes) -> msgport_transport::Result<()> {
        if message.len() > self.max {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                max: self.max,
            });
        }
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}

async fn write_loop<T>(
    mut writer: FramedWrite<WriteHalf<T>, MessageCodec>,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) where
    T: AsyncWrite,
{
    while let Some(message) = rx.recv().await {
        if let Err(err) = writer.send(message).await {
            warn!(error = %err, "framed write failed; dropping outbound queue");
            return;
        }
    }
    if let Err(err) = writer.close().await {
        debug!(error = %err, "framed stream shutdown failed");
    }
    debug!("framed outbound released");
}

#[cfg(test)]
mod tests {
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::codec::{encode_message, DEFAULT_MAX_PAYLOAD};

    #[tokio::test]
    async fn messages_cross_a_duplex_stream_in_order() {
        let (left, right) = duplex(1024);
        let (left_out, _left_in) = FramedEndpoint::new(left).split().unwrap();
        let (_right_out, mut right_in) = FramedEndpoint::new(right).split().unwrap();

        left_out.send(Bytes::from_static(b"alpha")).unwrap();
        left_out.send(Bytes::from_static(b"beta")).unwrap();

        assert_eq!(right_in.next().await.unwrap().unwrap().as_ref(), b"alpha");
        assert_eq!(right_in.next().await.unwrap().unwrap().as_ref(), b"beta");
    }

    #[tokio::test]
    async fn releasing_outbound_ends_peer_stream() {
        let (left, right) = duplex(1024);
        let (left_out, _left_in) = FramedEndpoint::new(left).split().unwrap();
        let (_right_out, mut right_in) = FramedEndpoint::new(right).split().unwrap();

        left_out.send(Bytes::from_static(b"bye")).unwrap();
        drop(left_out);

        assert_eq!(right_in.next().await.unwrap().unwrap().as_ref(), b"bye");
        assert!(right_in.next().await.is_none());
    }

    #[tokio::test]
    async fn oversized_send_is_rejected_locally() {
        let (left, _right) = duplex(64);
        let config = FrameConfig {
            max_payload_size: 8,
        };
        let (out, _inbound) = FramedEndpoint::with_config(left, config).split().unwrap();

        let err = out.send(Bytes::from(vec![0u8; 9])).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MessageTooLarge { size: 9, max: 8 }
        ));
    }

    #[tokio::test]
    async fn garbage_on_the_wire_surfaces_as_malformed() {
        let (mut raw, right) = duplex(64);
        let (_out, mut inbound) = FramedEndpoint::new(right).split().unwrap();

        raw.write_all(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x00]).await.unwrap();

        let err = inbound.next().await.unwrap().unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn wire_bytes_match_codec() {
        let (left, mut raw) = duplex(64);
        let (out, _inbound) = FramedEndpoint::new(left).split().unwrap();
        out.send(Bytes::from_static(b"xyz")).unwrap();

        let mut expected = bytes::BytesMut::new();
        encode_message(b"xyz", DEFAULT_MAX_PAYLOAD, &mut expected).unwrap();

        let mut got = vec![0u8; expected.len()];
        raw.read_exact(&mut got).await.unwrap();
        assert_eq!(got, expected.to_vec());
    }

    #[tokio::test]
    async fn write_closed_fires_after_queue_flushes() {
        let (left, right) = duplex(1024);
        let endpoint = FramedEndpoint::new(left);
        let write_closed = endpoint.write_closed();
        let (out, _inbound) = endpoint.split().unwrap();
        let (_right_out, mut right_in) = FramedEndpoint::new(right).split().unwrap();

        out.send(Bytes::from_static(b"last words")).unwrap();
        assert!(!write_closed.is_cancelled());
        drop(out);

        write_closed.cancelled().await;
        assert_eq!(
            right_in.next().await.unwrap().unwrap().as_ref(),
            b"last words"
        );
        assert!(right_in.next().await.is_none());
    }

    #[test]
    fn split_outside_runtime_fails() {
        let (left, _right) = duplex(64);
        let result = FramedEndpoint::new(left).split();
        assert!(matches!(result, Err(TransportError::NoRuntime(_))));
    }
}
