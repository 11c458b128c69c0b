//! Raw message transport for msgport.
//!
//! A transport endpoint is one half of a linked pair. It can enqueue an
//! opaque message for its peer and deliver the peer's messages as an ordered
//! stream. Delivery is at-most-once per send and preserves per-direction
//! order. There is no correlation, acknowledgement, or error propagation at
//! this layer; everything else builds on top of [`Endpoint`].

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{pair, MemoryEndpoint};
pub use traits::{BoxInbound, BoxOutbound, Endpoint, Outbound};
