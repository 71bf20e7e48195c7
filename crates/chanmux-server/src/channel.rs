use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use chanmux_frame::{encode_frame, varint, ChannelId, FrameConfig};
use futures_core::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::control::{ControlMessage, Handoff};
use crate::error::ChannelError;

/// Lifecycle state of a channel. `Open` → `Closing` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closing,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Open => f.write_str("open"),
            ChannelState::Closing => f.write_str("closing"),
        }
    }
}

/// Handler-facing handle to one logical channel.
///
/// Each handler receives its channel by value and owns it until it returns.
/// Inbound payloads arrive in order through [`Channel::recv`] or
/// [`Channel::read`]; outbound payloads are framed with the channel id and
/// queued on the connection's shared output.
pub struct Channel {
    id: ChannelId,
    state: ChannelState,
    input: mpsc::Receiver<Handoff>,
    output: mpsc::Sender<Handoff>,
    control: mpsc::Sender<ControlMessage>,
    frame_config: FrameConfig,
}

impl Channel {
    pub(crate) fn new(
        id: ChannelId,
        input: mpsc::Receiver<Handoff>,
        output: mpsc::Sender<Handoff>,
        control: mpsc::Sender<ControlMessage>,
        frame_config: FrameConfig,
    ) -> Self {
        Self {
            id,
            state: ChannelState::Open,
            input,
            output,
            control,
            frame_config,
        }
    }

    /// The channel id.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Locally observed lifecycle state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Receive the next inbound payload.
    ///
    /// Returns `None` once the input has been closed, and keeps returning
    /// `None` afterwards.
    pub async fn recv(&mut self) -> Option<Bytes> {
        let next = self.input.recv().await.map(Handoff::take);
        if next.is_none() {
            self.input_ended();
        }
        next
    }

    /// Inbound payloads as a single-pass stream.
    pub fn read(&mut self) -> ChannelReader<'_> {
        ChannelReader { channel: self }
    }

    /// Frame `payload` with this channel's id and hand it to the output writer.
    ///
    /// Returns once the writer has taken the frame. Fails once the
    /// connection's output has been closed.
    pub async fn write(&self, payload: &[u8]) -> Result<(), ChannelError> {
        self.frame_config
            .check_payload(payload.len())
            .map_err(|source| ChannelError::Frame {
                channel: self.id,
                source,
            })?;

        let mut frame = BytesMut::with_capacity(varint::encoded_len(self.id) + payload.len());
        encode_frame(self.id, payload, &mut frame);
        let (handoff, taken) = Handoff::new(frame.freeze());
        self.output
            .send(handoff)
            .await
            .map_err(|_| ChannelError::OutputClosed(self.id))?;
        taken.await.map_err(|_| ChannelError::OutputClosed(self.id))
    }

    /// Ask the control plane to end this channel's input.
    ///
    /// No-op if the channel is already closing. Frames already written are
    /// still delivered.
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        if self.state == ChannelState::Closing {
            return Ok(());
        }
        self.state = ChannelState::Closing;
        debug!(channel = self.id, "handler requested close");
        self.control
            .send(ControlMessage::CloseChannel(self.id))
            .await
            .map_err(|_| ChannelError::ControlClosed(self.id))
    }

    fn input_ended(&mut self) {
        if self.state == ChannelState::Open {
            debug!(channel = self.id, "channel input ended");
            self.state = ChannelState::Closing;
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}

/// Stream over a channel's inbound payloads, returned by [`Channel::read`].
pub struct ChannelReader<'a> {
    channel: &'a mut Channel,
}

impl Stream for ChannelReader<'_> {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let channel = &mut *self.get_mut().channel;
        match channel.input.poll_recv(cx) {
            Poll::Ready(Some(handoff)) => Poll::Ready(Some(handoff.take())),
            Poll::Ready(None) => {
                channel.input_ended();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
