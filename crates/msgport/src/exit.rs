use std::fmt;
use std::io;

use msgport_port::PortError;
use msgport_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::MessageTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        TransportError::NoRuntime(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn port_error(context: &str, err: PortError) -> CliError {
    match err {
        PortError::Transport(err) => transport_error(context, err),
        PortError::Remote(remote) => {
            let message = match &remote.data {
                Some(data) => format!("{context}: {remote} ({data})"),
                None => format!("{context}: {remote}"),
            };
            CliError::new(DATA_INVALID, message)
        }
        PortError::Json(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PortError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        PortError::NoRuntime => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use msgport_port::RemoteError;
    use serde_json::json;

    use super::*;

    #[test]
    fn remote_errors_are_data_invalid_and_keep_data() {
        let err = port_error(
            "request failed",
            PortError::Remote(RemoteError::new("division by zero").with_data(json!({"b": 0}))),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(err.message, "request failed: division by zero ({\"b\":0})");
    }

    #[test]
    fn timeouts_map_to_124() {
        let err = port_error("request failed", PortError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn missing_socket_is_a_transport_failure() {
        let err = port_error(
            "connect failed",
            PortError::Transport(TransportError::Io(io::Error::from(io::ErrorKind::NotFound))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn closed_port_is_a_plain_failure() {
        assert_eq!(port_error("send failed", PortError::Closed).code, FAILURE);
        assert_eq!(
            transport_error("send failed", TransportError::Closed).code,
            TRANSPORT_ERROR
        );
    }
}
