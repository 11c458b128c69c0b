use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::handlers::HandlerKind;
use crate::output::OutputFormat;

pub mod demo;
#[cfg(unix)]
pub mod notify;
#[cfg(unix)]
pub mod request;
#[cfg(unix)]
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve requests on a Unix socket.
    Serve(ServeArgs),
    /// Send one request and print the result.
    Request(RequestArgs),
    /// Send one notification.
    Notify(NotifyArgs),
    /// Run request/response scenarios over an in-memory channel.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args),
        Command::Demo(args) => block_on(demo::run(args, format)),
        #[cfg(unix)]
        Command::Serve(args) => block_on(serve::run(args)),
        #[cfg(unix)]
        Command::Request(args) => block_on(request::run(args, format)),
        #[cfg(unix)]
        Command::Notify(args) => block_on(notify::run(args, format)),
        #[cfg(not(unix))]
        Command::Serve(_) | Command::Request(_) | Command::Notify(_) => Err(CliError::new(
            USAGE,
            "socket commands need Unix domain sockets",
        )),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime startup failed", err))?;
    runtime.block_on(future)
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Request handler to install on each connection.
    #[arg(long, value_enum, default_value_t = HandlerKind::Echo)]
    pub handler: HandlerKind,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// JSON request payload.
    #[arg(long)]
    pub json: String,
    /// Time allowed for connecting and for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// JSON notification payload.
    #[arg(long)]
    pub json: String,
    /// Time allowed for connecting and flushing (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct DemoArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_payload(json: &str) -> CliResult<Value> {
    serde_json::from_str(json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(unix)]
pub(crate) async fn connect(
    path: &std::path::Path,
    timeout: Duration,
) -> CliResult<msgport_frame::FramedEndpoint<tokio::net::UnixStream>> {
    let stream = tokio::time::timeout(timeout, tokio::net::UnixStream::connect(path))
        .await
        .map_err(|_| {
            CliError::new(
                crate::exit::TIMEOUT,
                format!("connect to {} timed out after {timeout:?}", path.display()),
            )
        })?
        .map_err(|err| io_error(&format!("connect to {} failed", path.display()), err))?;
    Ok(msgport_frame::FramedEndpoint::new(stream))
}
