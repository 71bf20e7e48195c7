use chanmux_transport::MessageWriter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::control::Handoff;
use crate::error::{MuxError, Result};

/// What the output writer hands back when it stops.
pub(crate) struct WriterExit<W> {
    pub(crate) writer: W,
    pub(crate) result: Result<()>,
    pub(crate) frames: u64,
}

/// Drains the shared output queue onto the transport, one frame per message.
pub(crate) struct OutputWriter<W> {
    writer: W,
    output: mpsc::Receiver<Handoff>,
    close: CancellationToken,
    router: CancellationToken,
    frames: u64,
}

impl<W: MessageWriter> OutputWriter<W> {
    pub(crate) fn new(
        writer: W,
        output: mpsc::Receiver<Handoff>,
        close: CancellationToken,
        router: CancellationToken,
    ) -> Self {
        Self {
            writer,
            output,
            close,
            router,
            frames: 0,
        }
    }

    /// Write frames until the output is closed and drained, or a write fails.
    ///
    /// Cancelling `close` stops new frames from being accepted; frames already
    /// queued are still written. A write failure cancels the frame router.
    pub(crate) async fn run(mut self) -> WriterExit<W> {
        info!("output writer starting");
        let result = self.write_loop().await;
        match &result {
            Ok(()) => info!(frames = self.frames, "output writer stopped"),
            Err(err) => {
                error!(error = %err, "output writer failed");
                self.router.cancel();
            }
        }
        // Refuse further writes from any channel still holding a sender.
        self.output.close();
        WriterExit {
            writer: self.writer,
            result,
            frames: self.frames,
        }
    }

    async fn write_loop(&mut self) -> Result<()> {
        let mut closing = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.close.cancelled(), if !closing => {
                    debug!("output closed; draining queued frames");
                    self.output.close();
                    closing = true;
                    continue;
                }
                next = self.output.recv() => next,
            };
            let Some(handoff) = next else {
                return Ok(());
            };
            let frame = handoff.take();
            debug!(size = frame.len(), "writing frame");
            self.writer
                .write_binary(frame)
                .await
                .map_err(MuxError::TransportWrite)?;
            self.frames += 1;
        }
    }
}
