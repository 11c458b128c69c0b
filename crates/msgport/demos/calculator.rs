//! Calculator over an in-memory channel: requests, remote errors, and a
//! notification.
//!
//! Run with:
//!   cargo run --example calculator

use msgport::{AsyncChannel, PortError, RemoteError};
use serde_json::{json, Value};

fn calculate(payload: Value) -> Result<Value, RemoteError> {
    let a = payload["a"].as_f64().ok_or("missing a")?;
    let b = payload["b"].as_f64().ok_or("missing b")?;
    match payload["op"].as_str() {
        Some("add") => Ok(json!(a + b)),
        Some("mul") => Ok(json!(a * b)),
        Some("div") if b == 0.0 => Err(RemoteError::new("division by zero")),
        Some("div") => Ok(json!(a / b)),
        _ => Err(RemoteError::new("unsupported op").with_data(payload)),
    }
}

#[tokio::main]
async fn main() -> Result<(), PortError> {
    let channel = AsyncChannel::new()?;
    channel
        .port2()
        .on_request(|payload| async move { calculate(payload) });
    channel.port2().on_notification(|payload| {
        eprintln!("calculator heard: {payload}");
        Ok(())
    });

    let sum = channel
        .port1()
        .request(json!({"op": "add", "a": 2, "b": 3}))
        .await?;
    println!("2 + 3 = {sum}");

    match channel
        .port1()
        .request(json!({"op": "div", "a": 1, "b": 0}))
        .await
    {
        Err(PortError::Remote(err)) => println!("1 / 0 failed remotely: {err}"),
        other => println!("unexpected: {other:?}"),
    }

    channel.port1().post(json!({"event": "ping"}))?;

    let product = channel
        .port1()
        .request(json!({"op": "mul", "a": 6, "b": 7}))
        .await?;
    println!("6 * 7 = {product}");

    channel.port1().close();
    Ok(())
}
