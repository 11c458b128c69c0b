//! Ports over a byte stream using the length-prefixed frame codec.

use std::time::Duration;

use msgport_frame::{FrameConfig, FramedEndpoint};
use msgport_port::{AsyncPort, PortError, PortState, RemoteError};
use serde_json::{json, Value};

fn shout(payload: &Value) -> Result<Value, RemoteError> {
    let text = payload.as_str().ok_or("expected a string")?;
    Ok(json!(text.to_uppercase()))
}

#[cfg(unix)]
fn add(payload: &Value) -> Result<Value, RemoteError> {
    let a = payload["a"].as_i64().ok_or("missing a")?;
    let b = payload["b"].as_i64().ok_or("missing b")?;
    Ok(json!(a + b))
}

#[tokio::test]
async fn request_response_over_duplex_stream() {
    let (left, right) = tokio::io::duplex(64 * 1024);
    let client = AsyncPort::new(FramedEndpoint::new(left)).unwrap();
    let _server = AsyncPort::builder()
        .on_request(|payload| async move { shout(&payload) })
        .open(FramedEndpoint::new(right))
        .unwrap();

    assert_eq!(client.request(json!("shout")).await.unwrap(), json!("SHOUT"));

    let err = client.request(json!(5)).await.unwrap_err();
    assert!(matches!(err, PortError::Remote(RemoteError { ref message, .. }) if message == "expected a string"));
}

#[tokio::test]
async fn oversized_request_fails_without_closing_port() {
    let (left, right) = tokio::io::duplex(64 * 1024);
    let config = FrameConfig::default().with_max_payload_size(128);
    let client = AsyncPort::new(FramedEndpoint::with_config(left, config)).unwrap();
    let _server = AsyncPort::builder()
        .on_request(|payload| async move { Ok(payload) })
        .open(FramedEndpoint::new(right))
        .unwrap();

    let big = "x".repeat(1024);
    let err = client.request(json!(big)).await.unwrap_err();
    assert!(matches!(err, PortError::Transport(_)));
    assert_eq!(client.pending_count(), 0);

    assert_eq!(client.request(json!("small")).await.unwrap(), json!("small"));
}

#[tokio::test]
async fn oversized_response_settles_with_remote_error() {
    let (left, right) = tokio::io::duplex(64 * 1024);
    let client = AsyncPort::new(FramedEndpoint::new(left)).unwrap();
    let config = FrameConfig::default().with_max_payload_size(256);
    let _server = AsyncPort::builder()
        .on_request(|_| async move { Ok(json!("y".repeat(1024))) })
        .open(FramedEndpoint::with_config(right, config))
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(2), client.request(json!("small")))
        .await
        .expect("the caller must get an answer");
    match outcome {
        Err(PortError::Remote(err)) => {
            assert_eq!(err.message, "response could not be delivered");
            let detail = err.data.as_ref().and_then(Value::as_str).unwrap_or_default();
            assert!(detail.contains("too large"), "unexpected detail: {detail}");
        }
        other => panic!("expected a remote error, got {other:?}"),
    }
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn closing_one_side_closes_the_other() {
    let (left, right) = tokio::io::duplex(1024);
    let client = AsyncPort::new(FramedEndpoint::new(left)).unwrap();
    let server = AsyncPort::new(FramedEndpoint::new(right)).unwrap();

    client.close();

    tokio::time::timeout(Duration::from_secs(2), server.closed())
        .await
        .expect("server should observe the stream ending");
    assert_eq!(server.state(), PortState::Closed);
}

#[cfg(unix)]
#[tokio::test]
async fn request_response_over_unix_socket_pair() {
    let (left, right) = tokio::net::UnixStream::pair().unwrap();
    let client = AsyncPort::new(FramedEndpoint::new(left)).unwrap();
    let _server = AsyncPort::builder()
        .on_request(|payload| async move { add(&payload) })
        .open(FramedEndpoint::new(right))
        .unwrap();

    let sums = futures_util::future::join_all(
        (0..16).map(|i| client.request(json!({"a": i, "b": 100}))),
    )
    .await;
    for (i, sum) in sums.into_iter().enumerate() {
        assert_eq!(sum.unwrap(), json!(i as i64 + 100));
    }
}
