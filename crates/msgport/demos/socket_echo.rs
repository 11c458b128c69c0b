//! Echo port on a Unix socket. Serves one connection, then exits.
//!
//! Run with:
//!   cargo run --example socket-echo
//!
//! In another terminal:
//!   cargo run --features cli -- request <printed path> --json '{"hello":"world"}'

#[cfg(unix)]
mod unix {
    use std::fs;

    use msgport::frame::FramedEndpoint;
    use msgport::AsyncPort;
    use tokio::net::UnixListener;

    #[tokio::main]
    pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
        let sock_dir = std::env::temp_dir().join(format!("msgport-echo-{}", std::process::id()));
        fs::create_dir_all(&sock_dir)?;
        let sock_path = sock_dir.join("echo.sock");
        let _ = fs::remove_file(&sock_path);

        let listener = UnixListener::bind(&sock_path)?;
        eprintln!("Listening on {}", sock_path.display());

        let (stream, _) = listener.accept().await?;
        let port = AsyncPort::builder()
            .on_request(|payload| async move {
                eprintln!("Echoing {payload}");
                Ok(payload)
            })
            .on_notification(|payload| {
                eprintln!("Notification: {payload}");
                Ok(())
            })
            .open(FramedEndpoint::new(stream))?;
        eprintln!("Peer connected");

        port.closed().await;
        eprintln!("Peer disconnected");

        let _ = fs::remove_dir_all(&sock_dir);
        Ok(())
    }
}

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    unix::main()
}

#[cfg(not(unix))]
fn main() {
    eprintln!("socket-echo needs Unix domain sockets");
}
