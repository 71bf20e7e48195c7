use std::sync::Arc;

use chanmux_transport::{MessageTransport, MessageWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::MuxConfig;
use crate::control::RENDEZVOUS;
use crate::error::Result;
use crate::handler::Handler;
use crate::plane::ControlPlane;
use crate::router::{FrameRouter, RouterExit};
use crate::writer::OutputWriter;

/// Summary of one connection, returned when it has been torn down.
#[derive(Debug)]
pub struct MuxReport {
    /// Channels opened over the connection's lifetime.
    pub channels_opened: u64,
    /// Frames routed from the transport.
    pub frames_in: u64,
    /// Frames written to the transport.
    pub frames_out: u64,
    /// Why the frame router stopped.
    pub router_exit: RouterExit,
}

impl MuxReport {
    /// True if the frame router stopped because the peer closed the connection.
    ///
    /// Write failures never reach a report: [`Multiplexer::run`] returns the
    /// error instead.
    pub fn is_clean(&self) -> bool {
        matches!(self.router_exit, RouterExit::PeerClosed)
    }
}

/// Multiplexes logical channels over one message transport.
///
/// [`Multiplexer::run`] drives three connection-lifetime tasks (frame
/// router, control plane, output writer) plus one task per open channel, and
/// resolves once every channel has finished and the transport is closed.
pub struct Multiplexer<T, H> {
    transport: T,
    handler: Arc<H>,
    config: MuxConfig,
}

impl<T, H> Multiplexer<T, H>
where
    T: MessageTransport,
    H: Handler,
{
    /// Create a multiplexer with default configuration.
    pub fn new(transport: T, handler: H) -> Self {
        Self::with_shared_handler(transport, Arc::new(handler))
    }

    /// Create a multiplexer reusing a handler shared across connections.
    pub fn with_shared_handler(transport: T, handler: Arc<H>) -> Self {
        Self {
            transport,
            handler,
            config: MuxConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the connection to completion.
    ///
    /// The transport is closed only after the control plane has processed a
    /// finish for every opened channel. Returns the first fatal error seen by
    /// the router or writer, after teardown is complete.
    pub async fn run(self) -> Result<MuxReport> {
        let span = info_span!("mux", conn = %self.config.label);
        self.drive().instrument(span).await
    }

    async fn drive(self) -> Result<MuxReport> {
        let frame_config = self.config.frame_config();
        let (reader, writer) = self.transport.split();
        let (control_tx, control_rx) = mpsc::channel(RENDEZVOUS);
        let (output_tx, output_rx) = mpsc::channel(RENDEZVOUS);
        let stop_router = CancellationToken::new();
        let close_output = CancellationToken::new();

        let router = FrameRouter::new(
            reader,
            control_tx.clone(),
            stop_router.clone(),
            frame_config.clone(),
        );
        let router = tokio::spawn(router.run().in_current_span());

        let output = OutputWriter::new(writer, output_rx, close_output.clone(), stop_router);
        let output = tokio::spawn(output.run().in_current_span());

        let plane = ControlPlane::new(self.handler, control_tx, output_tx, frame_config);
        let channels_opened = plane.run(control_rx).await;

        close_output.cancel();
        let exit = output.await?;
        let mut writer = exit.writer;
        let close_result = writer.close().await;
        let (router_exit, frames_in) = router.await?;

        let report = MuxReport {
            channels_opened,
            frames_in,
            frames_out: exit.frames,
            router_exit,
        };
        info!(
            opened = report.channels_opened,
            frames_in = report.frames_in,
            frames_out = report.frames_out,
            exit = %report.router_exit,
            "connection closed"
        );

        if let Err(err) = close_result {
            warn!(error = %err, "transport close failed");
        }
        exit.result?;
        if let RouterExit::Failed(err) = report.router_exit {
            return Err(err);
        }
        debug!("connection torn down cleanly");
        Ok(report)
    }
}
