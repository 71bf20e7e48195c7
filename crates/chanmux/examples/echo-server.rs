//! Echo server: every opened channel gets its payloads written back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send /tmp/chanmux-echo-<pid>/echo.sock \
//!     --channel 7 --data hello --wait

use std::fs;

use chanmux::transport::UnixDomainSocket;
use chanmux::{Channel, Multiplexer};

async fn echo(mut channel: Channel) {
    while let Some(payload) = channel.recv().await {
        eprintln!(
            "Received {} bytes on channel {}",
            payload.len(),
            channel.id()
        );
        if channel.write(&payload).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("chanmux-echo-{}", std::process::id()));
    fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixDomainSocket::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    // Serve one connection until the peer disconnects.
    let transport = listener.accept().await?;
    let report = Multiplexer::new(transport, echo).run().await?;
    eprintln!(
        "Connection closed: {} channels, {} frames in, {} frames out",
        report.channels_opened, report.frames_in, report.frames_out
    );

    drop(listener);
    let _ = fs::remove_dir_all(&sock_dir);
    Ok(())
}
