use std::fs;
use std::time::{Duration, Instant};

use chanmux_frame::{
    control_frame, decode_frame, is_reserved, ChannelId, ControlCommand, Frame, DEFAULT_MAX_PAYLOAD,
};
use chanmux_transport::{MessageReader, MessageTransport, MessageWriter, UnixDomainSocket};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{
    frame_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_frame, FrameReport, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    if is_reserved(args.channel) {
        return Err(CliError::new(
            USAGE,
            format!("channel {} is reserved for control", args.channel),
        ));
    }
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let transport = UnixDomainSocket::connect(&args.path)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let (mut reader, mut writer) = transport.split();

    writer
        .write_binary(control_frame(&ControlCommand::OpenChannel(args.channel)))
        .await
        .map_err(|err| transport_error("open failed", err))?;
    writer
        .write_binary(Frame::new(args.channel, payload).to_bytes())
        .await
        .map_err(|err| transport_error("send failed", err))?;
    debug!(channel = args.channel, "payload sent");
    let sent_at = Instant::now();

    if args.wait {
        let frame = tokio::time::timeout(wait_timeout, wait_for_response(&mut reader, args.channel))
            .await
            .map_err(|_| {
                CliError::new(
                    TIMEOUT,
                    format!(
                        "no reply on channel {} within {:?}",
                        args.channel, wait_timeout
                    ),
                )
            })??;
        let socket = args.path.display().to_string();
        let report = FrameReport::new(&frame, &socket, sent_at.elapsed());
        print_frame(&frame, &report, format);
    }

    if let Err(err) = writer.close().await {
        debug!(error = %err, "close after send failed");
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
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

/// Read frames until one arrives on `channel`. Frames for other channels are
/// skipped.
async fn wait_for_response<R: MessageReader>(
    reader: &mut R,
    channel: ChannelId,
) -> CliResult<Frame> {
    loop {
        let message = reader
            .read()
            .await
            .map_err(|err| transport_error("receive failed", err))?;
        let message = match message {
            Some(message) if !message.is_close() => message,
            _ => {
                return Err(CliError::new(
                    FAILURE,
                    "connection closed before a reply arrived",
                ))
            }
        };
        if !message.is_binary() {
            debug!(kind = %message.kind, "skipping non-binary message");
            continue;
        }
        let frame = decode_frame(message.data, DEFAULT_MAX_PAYLOAD)
            .map_err(|err| frame_error("malformed reply", err))?;
        if frame.channel == channel {
            return Ok(frame);
        }
        debug!(channel = frame.channel, "skipping frame for another channel");
    }
}
