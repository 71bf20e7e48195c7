use std::sync::Arc;

use bytes::Bytes;
use chanmux_frame::varint::MAX_VARINT_LEN;
use chanmux_server::{Channel, Handler, MuxConfig, MuxReport, Multiplexer};
use chanmux_transport::{CodecConfig, MessageTransport, UnixDomainSocket, DEFAULT_MAX_MESSAGE};
use clap::ValueEnum;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, mux_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

/// Channel handlers available from the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BuiltinHandler {
    /// Write every payload back on the same channel.
    Echo,
    /// Write every payload back with ASCII letters upper-cased.
    Upper,
    /// Read and drop every payload.
    Discard,
}

impl BuiltinHandler {
    fn reply(self, payload: Bytes) -> Option<Bytes> {
        match self {
            BuiltinHandler::Echo => Some(payload),
            BuiltinHandler::Upper => Some(Bytes::from(payload.to_ascii_uppercase())),
            BuiltinHandler::Discard => None,
        }
    }
}

impl Handler for BuiltinHandler {
    async fn handle(&self, mut channel: Channel) {
        let id = channel.id();
        let mut served = 0u64;
        while let Some(payload) = channel.recv().await {
            served += 1;
            let Some(reply) = self.reply(payload) else {
                continue;
            };
            if let Err(err) = channel.write(&reply).await {
                warn!(channel = id, error = %err, "reply dropped");
                break;
            }
        }
        debug!(channel = id, served, handler = ?self, "channel done");
    }
}

async fn serve_connection<T: MessageTransport>(
    mux: Multiplexer<T, BuiltinHandler>,
) -> CliResult<MuxReport> {
    mux.run()
        .await
        .map_err(|err| mux_error("connection failed", err))
}

pub async fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    if args.max_payload == 0 {
        return Err(CliError::new(USAGE, "--max-payload must be greater than zero"));
    }

    let codec = CodecConfig {
        max_message_size: DEFAULT_MAX_MESSAGE.max(args.max_payload + MAX_VARINT_LEN),
    };
    let listener = UnixDomainSocket::bind(&args.path)
        .map_err(|err| transport_error("bind failed", err))?
        .with_codec_config(codec);
    info!(
        path = %listener.path().display(),
        handler = ?args.handler,
        max_payload = args.max_payload,
        "serving"
    );

    let handler = Arc::new(args.handler);
    let mut connections = JoinSet::new();
    let mut accepted = 0u64;
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let transport = tokio::select! {
            signal = &mut interrupt => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!("interrupt received; stopping");
                break;
            }
            next = listener.accept() => next.map_err(|err| transport_error("accept failed", err))?,
        };

        accepted += 1;
        let config = MuxConfig {
            label: format!("conn-{accepted}"),
            max_payload_size: args.max_payload,
        };
        let mux = Multiplexer::with_shared_handler(transport, Arc::clone(&handler))
            .with_config(config);
        connections.spawn(async move {
            match serve_connection(mux).await {
                Ok(report) => debug!(
                    opened = report.channels_opened,
                    frames_in = report.frames_in,
                    "connection finished"
                ),
                Err(err) => warn!(code = err.code, error = %err, "connection failed"),
            }
        });

        while let Some(joined) = connections.try_join_next() {
            if let Err(err) = joined {
                error!(error = %err, "connection task failed");
            }
        }
    }

    if !connections.is_empty() {
        info!(open = connections.len(), "dropping open connections");
    }
    connections.shutdown().await;
    Ok(SUCCESS)
}
