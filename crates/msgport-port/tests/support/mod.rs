#![allow(dead_code)]

use std::time::Duration;

use msgport_port::Envelope;
use msgport_transport::MemoryEndpoint;

pub const STEP: Duration = Duration::from_secs(2);

/// Read and decode the next envelope a port wrote to its raw peer.
pub async fn next_envelope(endpoint: &mut MemoryEndpoint) -> Envelope {
    let bytes = tokio::time::timeout(STEP, endpoint.recv())
        .await
        .expect("envelope should arrive in time")
        .expect("port should still hold the transport");
    Envelope::decode(&bytes).expect("port should only emit valid envelopes")
}

/// True if nothing arrives on `endpoint` within `wait`.
pub async fn stays_quiet(endpoint: &mut MemoryEndpoint, wait: Duration) -> bool {
    tokio::time::timeout(wait, endpoint.recv()).await.is_err()
}

pub fn send_envelope(endpoint: &MemoryEndpoint, envelope: Envelope) {
    endpoint
        .send(envelope.encode().expect("envelope should encode"))
        .expect("port should still be listening");
}
