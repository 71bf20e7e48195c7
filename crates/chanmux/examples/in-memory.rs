//! Two channels over an in-process transport pair.
//!
//! Run with:
//!   cargo run --example in-memory

use bytes::Bytes;
use chanmux::frame::{control_frame, decode_frame, ControlCommand, Frame, DEFAULT_MAX_PAYLOAD};
use chanmux::transport::{MemoryTransport, MessageReader, MessageTransport, MessageWriter};
use chanmux::{Channel, Multiplexer};

async fn shout(mut channel: Channel) {
    while let Some(payload) = channel.recv().await {
        let reply = format!("{}:{}", channel.id(), String::from_utf8_lossy(&payload));
        if channel.write(reply.to_uppercase().as_bytes()).await.is_err() {
            break;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (server, client) = MemoryTransport::pair();
    let mux = tokio::spawn(Multiplexer::new(server, shout).run());
    let (mut reader, mut writer) = client.split();

    for id in [3, 5] {
        writer
            .write_binary(control_frame(&ControlCommand::OpenChannel(id)))
            .await?;
    }
    writer
        .write_binary(Frame::new(3, Bytes::from_static(b"left")).to_bytes())
        .await?;
    writer
        .write_binary(Frame::new(5, Bytes::from_static(b"right")).to_bytes())
        .await?;

    for _ in 0..2 {
        if let Some(message) = reader.read().await? {
            let frame = decode_frame(message.data, DEFAULT_MAX_PAYLOAD)?;
            println!(
                "channel {}: {}",
                frame.channel,
                String::from_utf8_lossy(&frame.payload)
            );
        }
    }

    writer.close().await?;
    let report = mux.await??;
    println!(
        "closed after {} channels, {} frames in",
        report.channels_opened, report.frames_in
    );
    Ok(())
}
