use std::time::Duration;

use msgport_port::{AsyncChannel, PortError, PortState, RequestOptions};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::cmd::DemoArgs;
use crate::exit::{port_error, CliResult, FAILURE, SUCCESS};
use crate::handlers::calculate;
use crate::output::{print_demo, DemoRow, OutputFormat};

const SLOW_MS: u64 = 200;
const SHORT_TIMEOUT: Duration = Duration::from_millis(50);

pub async fn run(_args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let rows = scenarios().await?;
    print_demo(&rows, format);

    if rows.iter().all(|row| row.passed) {
        Ok(SUCCESS)
    } else {
        Ok(FAILURE)
    }
}

async fn scenarios() -> CliResult<Vec<DemoRow>> {
    let channel = AsyncChannel::new().map_err(|err| port_error("channel setup failed", err))?;
    let (notified_tx, mut notified_rx) = mpsc::unbounded_channel();

    channel.port2().on_request(|payload: Value| async move {
        if let Some(delay) = payload.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        calculate(&payload)
    });
    channel.port2().on_notification(move |payload| {
        let _ = notified_tx.send(payload);
        Ok(())
    });

    let client = channel.port1();
    let mut rows = Vec::new();

    let request = json!({"op": "add", "a": 2, "b": 3});
    let result = client.request(request.clone()).await;
    let passed = matches!(&result, Ok(value) if *value == json!(5));
    rows.push(row("add", request, &result, passed));

    let request = json!({"op": "div", "a": 1, "b": 0});
    let result = client.request(request.clone()).await;
    let passed = matches!(&result, Err(PortError::Remote(err)) if err.message == "division by zero");
    rows.push(row("remote error", request, &result, passed));

    let request = json!({"event": "ping"});
    let posted = client.post(request.clone());
    let received = tokio::time::timeout(Duration::from_secs(1), notified_rx.recv())
        .await
        .ok()
        .flatten();
    let passed = posted.is_ok() && received.as_ref() == Some(&request) && client.pending_count() == 0;
    let outcome = match (&posted, &received) {
        (Err(err), _) => format!("error: {err}"),
        (Ok(()), Some(payload)) => format!("peer received {payload}"),
        (Ok(()), None) => "peer received nothing".to_string(),
    };
    rows.push(DemoRow {
        scenario: "notification",
        request,
        outcome,
        passed,
    });

    let request = json!({"op": "mul", "a": 6, "b": 7, "delay_ms": SLOW_MS});
    let result = client
        .request_with(request.clone(), RequestOptions::with_timeout(SHORT_TIMEOUT))
        .await;
    let passed = matches!(result, Err(PortError::Timeout(_)));
    rows.push(row("timeout", request, &result, passed));

    let request = json!({"op": "sub", "a": 9, "b": 4, "delay_ms": SLOW_MS});
    let reply = client.request(request.clone());
    reply.cancel();
    let result = reply.await;
    let passed = matches!(result, Err(PortError::Cancelled));
    rows.push(row("cancel", request, &result, passed));

    let request = json!({"op": "add", "a": 1, "b": 1, "delay_ms": SLOW_MS});
    let reply = client.request(request.clone());
    client.close();
    let result = reply.await;
    let passed = matches!(result, Err(PortError::Closed))
        && client.state() == PortState::Closed
        && client.pending_count() == 0;
    rows.push(row("close", request, &result, passed));

    Ok(rows)
}

fn row(scenario: &'static str, request: Value, result: &Result<Value, PortError>, passed: bool) -> DemoRow {
    let outcome = match result {
        Ok(value) => value.to_string(),
        Err(err) => format!("error: {err}"),
    };
    DemoRow {
        scenario,
        request,
        outcome,
        passed,
    }
}
