use chanmux_frame::{ChannelId, FrameError};
use chanmux_transport::{MessageKind, TransportError};

/// Errors raised by the multiplexing engine.
///
/// Transport and framing errors end the loop that observed them and start
/// connection teardown. Control-plane errors drop the offending message.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Reading from the transport failed.
    #[error("transport read failed: {0}")]
    TransportRead(#[source] TransportError),

    /// Writing to the transport failed; the connection is unusable.
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] TransportError),

    /// The peer sent a message that is not binary.
    #[error("unsupported {0} message")]
    UnsupportedMessageKind(MessageKind),

    /// A frame did not start with a decodable channel id.
    #[error("malformed channel id: {0}")]
    MalformedChannelId(#[source] FrameError),

    /// A frame payload exceeded the configured maximum.
    #[error("frame rejected: {0}")]
    Frame(#[source] FrameError),

    /// A frame addressed a channel that is not open.
    #[error("unknown channel id {0}")]
    UnknownChannelId(ChannelId),

    /// A control frame carried no command byte.
    #[error("empty control message")]
    EmptyControlMessage,

    /// A control frame carried an unimplemented command byte.
    #[error("unknown control command {0}")]
    UnknownControlCommand(u8),

    /// A control command's argument could not be decoded.
    #[error("malformed control command: {0}")]
    MalformedControlCommand(#[source] FrameError),

    /// The peer tried to open the reserved control channel.
    #[error("channel id {0} is reserved")]
    ReservedChannelId(ChannelId),

    /// The peer tried to open a channel that is already open.
    #[error("channel id {0} is already in use")]
    DuplicateChannelId(ChannelId),

    /// A close or finish named a channel that is not registered.
    #[error("channel id {0} is not registered")]
    ChannelNotFound(ChannelId),

    /// An open arrived after the transport had already ended.
    #[error("connection is closing; channel {0} not opened")]
    ConnectionClosing(ChannelId),

    /// The control plane stopped while a loop still needed it.
    #[error("control plane stopped")]
    ControlPlaneGone,

    /// One of the connection tasks panicked or was aborted.
    #[error("connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MuxError {
    /// Classify a control-payload decoding failure.
    pub fn from_control(err: FrameError) -> Self {
        match err {
            FrameError::EmptyControlMessage => MuxError::EmptyControlMessage,
            FrameError::UnknownControlCommand(command) => MuxError::UnknownControlCommand(command),
            other => MuxError::MalformedControlCommand(other),
        }
    }

    /// Classify a frame-prefix decoding failure.
    pub fn from_frame(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge { .. } => MuxError::Frame(err),
            other => MuxError::MalformedChannelId(other),
        }
    }
}

/// Errors returned to handlers from [`crate::Channel`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The connection's output sink has been closed.
    #[error("channel {0}: output closed")]
    OutputClosed(ChannelId),

    /// The control plane is no longer accepting messages.
    #[error("channel {0}: control plane stopped")]
    ControlClosed(ChannelId),

    /// The payload exceeds the configured maximum.
    #[error("channel {channel}: {source}")]
    Frame {
        channel: ChannelId,
        #[source]
        source: FrameError,
    },
}

pub type Result<T> = std::result::Result<T, MuxError>;
