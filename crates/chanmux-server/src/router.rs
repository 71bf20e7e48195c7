use std::fmt;

use bytes::Bytes;
use chanmux_frame::{decode_control, decode_frame, FrameConfig, CONTROL_CHANNEL};
use chanmux_transport::MessageReader;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::control::{ControlMessage, Handoff, Route};
use crate::error::{MuxError, Result};

/// Why the frame router stopped reading.
#[derive(Debug)]
pub enum RouterExit {
    /// The peer ended the stream or sent a close message.
    PeerClosed,
    /// The output writer failed and cancelled reading.
    Cancelled,
    /// A fatal transport or framing error.
    Failed(MuxError),
}

impl fmt::Display for RouterExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterExit::PeerClosed => f.write_str("peer closed"),
            RouterExit::Cancelled => f.write_str("cancelled"),
            RouterExit::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Reads transport messages and dispatches each frame to the control plane
/// or to the addressed channel's input.
///
/// Delivery waits until the channel's handler takes the payload, so one slow
/// handler holds up every channel behind it.
pub(crate) struct FrameRouter<R> {
    reader: R,
    control: mpsc::Sender<ControlMessage>,
    cancel: CancellationToken,
    frame_config: FrameConfig,
    frames: u64,
}

impl<R: MessageReader> FrameRouter<R> {
    pub(crate) fn new(
        reader: R,
        control: mpsc::Sender<ControlMessage>,
        cancel: CancellationToken,
        frame_config: FrameConfig,
    ) -> Self {
        Self {
            reader,
            control,
            cancel,
            frame_config,
            frames: 0,
        }
    }

    /// Route frames until the transport ends, then tell the control plane.
    ///
    /// Returns the exit reason and the number of frames routed.
    pub(crate) async fn run(mut self) -> (RouterExit, u64) {
        info!("frame router starting");
        let exit = self.read_loop().await;
        match &exit {
            RouterExit::Failed(err) => error!(error = %err, "frame router failed"),
            other => info!(exit = %other, frames = self.frames, "frame router stopped"),
        }
        if self.control.send(ControlMessage::TransportEnded).await.is_err() {
            warn!("control plane gone before transport end was reported");
        }
        (exit, self.frames)
    }

    async fn read_loop(&mut self) -> RouterExit {
        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RouterExit::Cancelled,
                read = self.reader.read() => read,
            };
            let message = match read {
                Ok(Some(message)) => message,
                Ok(None) => return RouterExit::PeerClosed,
                Err(err) => return RouterExit::Failed(MuxError::TransportRead(err)),
            };
            if message.is_close() {
                debug!("peer sent close");
                return RouterExit::PeerClosed;
            }
            if !message.is_binary() {
                return RouterExit::Failed(MuxError::UnsupportedMessageKind(message.kind));
            }
            if let Err(err) = self.route(message.data).await {
                return RouterExit::Failed(err);
            }
            self.frames += 1;
        }
    }

    async fn route(&mut self, data: Bytes) -> Result<()> {
        let frame =
            decode_frame(data, self.frame_config.max_payload_size).map_err(MuxError::from_frame)?;
        let id = frame.channel;

        if id == CONTROL_CHANNEL {
            match decode_control(&frame.payload) {
                Ok(command) => {
                    debug!(%command, "control command");
                    self.send_control(ControlMessage::Remote(command)).await?;
                }
                Err(err) => {
                    let err = MuxError::from_control(err);
                    warn!(error = %err, "control frame dropped");
                }
            }
            return Ok(());
        }

        let (reply, answer) = oneshot::channel();
        self.send_control(ControlMessage::Route { id, reply }).await?;
        match answer.await.map_err(|_| MuxError::ControlPlaneGone)? {
            Route::Deliver(input) => {
                debug!(channel = id, size = frame.payload.len(), "delivering frame");
                let (handoff, taken) = Handoff::new(frame.payload);
                let sent = input.send(handoff).await;
                drop(input);
                if sent.is_err() || taken.await.is_err() {
                    debug!(channel = id, "handler stopped reading; frame dropped");
                }
                Ok(())
            }
            Route::Closing => {
                warn!(channel = id, "channel input already closed; frame dropped");
                Ok(())
            }
            Route::Unknown => Err(MuxError::UnknownChannelId(id)),
        }
    }

    async fn send_control(&mut self, message: ControlMessage) -> Result<()> {
        self.control
            .send(message)
            .await
            .map_err(|_| MuxError::ControlPlaneGone)
    }
}
