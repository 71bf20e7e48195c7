use clap::{Args, Subcommand};
use std::path::PathBuf;

use chanmux_frame::{ChannelId, DEFAULT_MAX_PAYLOAD};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

pub use serve::BuiltinHandler;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and serve every opened channel.
    Serve(ServeArgs),
    /// Open a channel and send a single payload.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Handler run for each opened channel.
    #[arg(long, value_enum, default_value = "echo")]
    pub handler: BuiltinHandler,
    /// Maximum payload size per frame, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Channel to open and send on.
    #[arg(long, short = 'c', default_value = "1")]
    pub channel: ChannelId,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one frame on the channel and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
