use std::io::{IsTerminal, Write};
use std::time::Duration;

use chanmux_frame::{channel_name, Frame};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Bytes of a binary payload shown in previews.
const HEX_PREVIEW_LEN: usize = 32;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A frame received by the CLI, with where it came from and how long it took.
#[derive(Serialize)]
pub struct FrameReport<'a> {
    channel: u64,
    channel_name: &'static str,
    payload_size: usize,
    wire_size: usize,
    encoding: &'static str,
    payload: String,
    socket: &'a str,
    elapsed_ms: u128,
}

impl<'a> FrameReport<'a> {
    pub fn new(frame: &Frame, socket: &'a str, elapsed: Duration) -> Self {
        let (encoding, payload) = preview(frame.payload.as_ref());
        Self {
            channel: frame.channel,
            channel_name: channel_name(frame.channel),
            payload_size: frame.payload.len(),
            wire_size: frame.wire_size(),
            encoding,
            payload,
            socket,
            elapsed_ms: elapsed.as_millis(),
        }
    }
}

pub fn print_frame(frame: &Frame, report: &FrameReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (field, value) in [
                ("channel", format!("{} ({})", report.channel, report.channel_name)),
                ("size", format!("{} bytes ({} on wire)", report.payload_size, report.wire_size)),
                ("socket", report.socket.to_string()),
                ("elapsed", format!("{} ms", report.elapsed_ms)),
                (report.encoding, report.payload.clone()),
            ] {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "[{} {}] {} bytes from {} after {}ms: {}",
            report.channel_name,
            report.channel,
            report.payload_size,
            report.socket,
            report.elapsed_ms,
            report.payload
        ),
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(frame.payload.as_ref());
            let _ = out.flush();
        }
    }
}

/// Text payloads are shown as-is; anything else as a hex prefix.
fn preview(payload: &[u8]) -> (&'static str, String) {
    if let Ok(text) = std::str::from_utf8(payload) {
        return ("utf8", text.to_string());
    }
    let mut hex: String = payload
        .iter()
        .take(HEX_PREVIEW_LEN)
        .map(|byte| format!("{byte:02x}"))
        .collect();
    if payload.len() > HEX_PREVIEW_LEN {
        hex.push_str("..");
    }
    ("hex", hex)
}
