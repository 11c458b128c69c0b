use std::time::Instant;

use msgport_port::{AsyncPort, PortConfig, RequestOptions};
use tracing::debug;

use crate::cmd::{connect, parse_duration, parse_payload, RequestArgs};
use crate::exit::{port_error, CliResult, SUCCESS};
use crate::output::{print_reply, OutputFormat};

pub async fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = parse_payload(&args.json)?;
    let timeout = parse_duration(&args.timeout)?;

    let endpoint = connect(&args.path, timeout).await?;
    let port = AsyncPort::with_config(endpoint, PortConfig::default().with_name("request"))
        .map_err(|err| port_error("port setup failed", err))?;

    let started = Instant::now();
    let reply = port.request_with(payload, RequestOptions::with_timeout(timeout));
    let id = reply.id();
    debug!(?id, ?timeout, "request sent");

    let result = reply
        .await
        .map_err(|err| port_error("request failed", err))?;
    print_reply(&args.path, id, &result, started.elapsed(), format);

    port.close();
    Ok(SUCCESS)
}
