use msgport_port::{AsyncPort, PortConfig};
use tracing::debug;

use crate::cmd::{connect, parse_duration, parse_payload, NotifyArgs};
use crate::exit::{port_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_notified, OutputFormat};

pub async fn run(args: NotifyArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_payload(&args.json)?;
    let timeout = parse_duration(&args.timeout)?;

    let endpoint = connect(&args.path, timeout).await?;
    let write_closed = endpoint.write_closed();
    let port = AsyncPort::with_config(endpoint, PortConfig::default().with_name("notify"))
        .map_err(|err| port_error("port setup failed", err))?;

    port.post(payload)
        .map_err(|err| port_error("notify failed", err))?;
    port.close();

    // post only queues the frame; wait for the writer before exiting.
    tokio::time::timeout(timeout, write_closed.cancelled())
        .await
        .map_err(|_| CliError::new(TIMEOUT, "timed out flushing notification"))?;
    debug!("notification flushed");

    print_notified(&args.path, format);
    Ok(SUCCESS)
}
