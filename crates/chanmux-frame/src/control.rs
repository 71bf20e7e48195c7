//! Commands carried on the control channel.
//!
//! A control frame is `varint(0) ++ command_byte ++ arguments`. Command byte
//! values are a contract with the peer implementation.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::{ChannelId, CONTROL_CHANNEL};
use crate::error::{FrameError, Result};
use crate::varint;

/// Open a channel; argument is `varint(new_channel_id)`.
pub const CMD_OPEN_CHANNEL: u8 = 1;

/// Reserved for a peer-initiated close. Not accepted by this implementation.
pub const CMD_CLOSE_CHANNEL: u8 = 2;

/// A decoded control-channel command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    OpenChannel(ChannelId),
}

impl ControlCommand {
    /// Command byte for this variant.
    pub fn code(&self) -> u8 {
        match self {
            ControlCommand::OpenChannel(_) => CMD_OPEN_CHANNEL,
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::OpenChannel(id) => write!(f, "open-channel({id})"),
        }
    }
}

/// Decode the payload of a control frame (everything after `varint(0)`).
///
/// Bytes following a complete argument are ignored.
pub fn decode_control(payload: &[u8]) -> Result<ControlCommand> {
    let (&command, args) = payload
        .split_first()
        .ok_or(FrameError::EmptyControlMessage)?;
    match command {
        CMD_OPEN_CHANNEL => {
            let (id, _rest) =
                varint::decode(args).map_err(|err| FrameError::MalformedControlArgument {
                    command,
                    source: Box::new(err),
                })?;
            Ok(ControlCommand::OpenChannel(id))
        }
        other => Err(FrameError::UnknownControlCommand(other)),
    }
}

/// Encode a control payload (without the channel prefix).
pub fn encode_control(command: &ControlCommand, dst: &mut BytesMut) {
    dst.put_u8(command.code());
    match command {
        ControlCommand::OpenChannel(id) => varint::encode_into(*id, dst),
    }
}

/// Encode a complete control frame, ready to send as one transport message.
pub fn control_frame(command: &ControlCommand) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + varint::MAX_VARINT_LEN);
    varint::encode_into(CONTROL_CHANNEL, &mut buf);
    encode_control(command, &mut buf);
    buf.freeze()
}
