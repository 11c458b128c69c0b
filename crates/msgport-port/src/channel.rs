use crate::config::PortConfig;
use crate::error::Result;
use crate::port::AsyncPort;

/// Two ports linked over an in-memory transport.
///
/// Whatever is requested or posted on one port is dispatched on the other.
/// The pair is an ordinary owned value; drop it (or its ports) to tear the
/// channel down.
#[derive(Debug)]
pub struct AsyncChannel {
    port1: AsyncPort,
    port2: AsyncPort,
}

impl AsyncChannel {
    /// Create a channel with default port configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(PortConfig::default())
    }

    /// Create a channel; both ports share `config` and are named
    /// `port1`/`port2`.
    pub fn with_config(config: PortConfig) -> Result<Self> {
        let (left, right) = msgport_transport::pair();
        let port1 = AsyncPort::with_config(left, config.clone().with_name("port1"))?;
        let port2 = AsyncPort::with_config(right, config.with_name("port2"))?;
        Ok(Self { port1, port2 })
    }

    pub fn port1(&self) -> &AsyncPort {
        &self.port1
    }

    pub fn port2(&self) -> &AsyncPort {
        &self.port2
    }

    /// Split the channel so each port can move to its own task.
    pub fn into_ports(self) -> (AsyncPort, AsyncPort) {
        (self.port1, self.port2)
    }
}
