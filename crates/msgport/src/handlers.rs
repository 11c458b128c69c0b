use clap::ValueEnum;
use msgport_port::{PortBuilder, RemoteError};
use serde_json::{json, Value};

/// Built-in request handlers the CLI can serve.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum HandlerKind {
    /// Answer every request with its own payload.
    #[default]
    Echo,
    /// Integer arithmetic on `{"op", "a", "b"}` payloads.
    Calc,
}

impl HandlerKind {
    pub fn install(self, builder: PortBuilder) -> PortBuilder {
        match self {
            HandlerKind::Echo => builder.on_request(|payload| async move { Ok(payload) }),
            HandlerKind::Calc => builder.on_request(|payload| async move { calculate(&payload) }),
        }
    }
}

const SUPPORTED_OPS: [&str; 4] = ["add", "sub", "mul", "div"];

/// Evaluate `{"op": "add"|"sub"|"mul"|"div", "a": int, "b": int}`.
pub fn calculate(payload: &Value) -> Result<Value, RemoteError> {
    let op = payload
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::new("missing string field: op"))?;
    let a = operand(payload, "a")?;
    let b = operand(payload, "b")?;

    let result = match op {
        "add" => a.checked_add(b),
        "sub" => a.checked_sub(b),
        "mul" => a.checked_mul(b),
        "div" if b == 0 => {
            return Err(RemoteError::new("division by zero").with_data(payload.clone()))
        }
        "div" => a.checked_div(b),
        other => {
            return Err(RemoteError::new(format!("unsupported op: {other}"))
                .with_data(json!({ "supported": SUPPORTED_OPS })))
        }
    };

    result
        .map(Value::from)
        .ok_or_else(|| RemoteError::new("integer overflow").with_data(payload.clone()))
}

fn operand(payload: &Value, name: &str) -> Result<i64, RemoteError> {
    payload
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| RemoteError::new(format!("missing integer field: {name}")))
}
