use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use msgport_frame::FramedEndpoint;
use msgport_port::{AsyncPort, PortConfig};
use msgport_transport::Endpoint;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::handlers::HandlerKind;

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    remove_stale_socket(&args.path)?;
    let listener = UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("bind {} failed", args.path.display()), err))?;
    info!(path = %args.path.display(), handler = ?args.handler, "serving");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut connections = 0u64;
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(err) = signal {
                    return Err(CliError::new(
                        INTERNAL,
                        format!("signal handler setup failed: {err}"),
                    ));
                }
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    connections += 1;
                    serve_connection(FramedEndpoint::new(stream), connections, args.handler);
                }
                Err(err) => warn!(error = %err, "accept failed"),
            },
        }
    }

    info!(connections, "shutting down");
    if let Err(err) = std::fs::remove_file(&args.path) {
        warn!(error = %err, "failed removing socket file");
    }
    Ok(SUCCESS)
}

/// Start a port for one accepted connection. A connection that cannot be
/// set up is logged and dropped; the listener keeps going.
fn serve_connection<E: Endpoint>(endpoint: E, conn: u64, handler: HandlerKind) -> bool {
    let builder = AsyncPort::builder()
        .config(PortConfig::default().with_name(format!("conn-{conn}")))
        .on_notification(move |payload| {
            info!(conn, %payload, "notification received");
            Ok(())
        });
    let port = match handler.install(builder).open(endpoint) {
        Ok(port) => port,
        Err(err) => {
            warn!(conn, error = %err, "connection setup failed");
            return false;
        }
    };
    info!(conn, "connection accepted");

    tokio::spawn(async move {
        port.closed().await;
        info!(conn, "connection closed");
    });
    true
}

fn remove_stale_socket(path: &Path) -> CliResult<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path)
            .map_err(|err| io_error("removing stale socket failed", err)),
        Ok(_) => Err(CliError::new(
            USAGE,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error("inspecting socket path failed", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("msgport-serve-{tag}-{}", std::process::id()))
    }

    #[test]
    fn failed_connection_setup_is_skipped() {
        // No runtime here, so the port cannot start.
        let (endpoint, _peer) = msgport_transport::pair();
        assert!(!serve_connection(endpoint, 1, HandlerKind::Echo));
    }

    #[tokio::test]
    async fn accepted_connection_gets_a_port() {
        let (endpoint, _peer) = msgport_transport::pair();
        assert!(serve_connection(endpoint, 2, HandlerKind::Calc));
    }

    #[test]
    fn missing_path_is_fine() {
        assert!(remove_stale_socket(&temp_path("missing")).is_ok());
    }

    #[test]
    fn regular_file_is_not_replaced() {
        let path = temp_path("regular");
        std::fs::write(&path, b"keep me").unwrap();

        let err = remove_stale_socket(&path).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn stale_socket_is_removed() {
        let path = temp_path("stale");
        let _ = std::fs::remove_file(&path);
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        remove_stale_socket(&path).unwrap();
        assert!(!path.exists());
    }
}
