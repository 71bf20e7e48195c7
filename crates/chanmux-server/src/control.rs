use std::fmt;

use bytes::Bytes;
use chanmux_frame::{ChannelId, ControlCommand};
use tokio::sync::{mpsc, oneshot};

/// Mailbox depth for the control plane, channel inputs and the output sink.
///
/// Tokio queues cannot be zero-sized. Channel inputs and the output sink
/// carry a [`Handoff`], so their senders also wait for the receiver to take
/// each payload before moving on.
pub(crate) const RENDEZVOUS: usize = 1;

/// A payload passed from one task to another, acknowledged when taken.
#[derive(Debug)]
pub(crate) struct Handoff {
    payload: Bytes,
    taken: oneshot::Sender<()>,
}

impl Handoff {
    /// Wrap `payload`; the receiver resolves once the other side takes it.
    pub(crate) fn new(payload: Bytes) -> (Self, oneshot::Receiver<()>) {
        let (taken, ack) = oneshot::channel();
        (Self { payload, taken }, ack)
    }

    /// Take the payload and release the sender.
    pub(crate) fn take(self) -> Bytes {
        let _ = self.taken.send(());
        self.payload
    }
}

/// Coordination record processed by the control plane, in arrival order.
pub(crate) enum ControlMessage {
    /// A decoded command received on the control channel.
    Remote(ControlCommand),
    /// The frame router asks where to deliver a frame for `id`.
    Route {
        id: ChannelId,
        reply: oneshot::Sender<Route>,
    },
    /// Register `id` and start its handler.
    OpenChannel(ChannelId),
    /// End the input of `id`.
    CloseChannel(ChannelId),
    /// The handler for `id` has returned.
    FinishChannel(ChannelId),
    /// The transport read side has ended.
    TransportEnded,
}

/// Answer to a [`ControlMessage::Route`] lookup.
#[derive(Debug)]
pub(crate) enum Route {
    Deliver(mpsc::Sender<Handoff>),
    Closing,
    Unknown,
}

impl ControlMessage {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ControlMessage::Remote(_) => "remote",
            ControlMessage::Route { .. } => "route",
            ControlMessage::OpenChannel(_) => "open-channel",
            ControlMessage::CloseChannel(_) => "close-channel",
            ControlMessage::FinishChannel(_) => "finish-channel",
            ControlMessage::TransportEnded => "transport-ended",
        }
    }
}

impl fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Remote(command) => write!(f, "Remote({command})"),
            ControlMessage::Route { id, .. } => write!(f, "Route({id})"),
            ControlMessage::OpenChannel(id) => write!(f, "OpenChannel({id})"),
            ControlMessage::CloseChannel(id) => write!(f, "CloseChannel({id})"),
            ControlMessage::FinishChannel(id) => write!(f, "FinishChannel({id})"),
            ControlMessage::TransportEnded => f.write_str("TransportEnded"),
        }
    }
}
