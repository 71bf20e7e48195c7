//! Channel-id framing for chanmux.
//!
//! Every transport message carries exactly one frame:
//! - A varint channel id (7 bits per byte, continuation bit, LSB group first)
//! - The remaining bytes as payload
//!
//! Frames addressed to channel 0 carry [`ControlCommand`]s.

pub mod channel;
pub mod codec;
pub mod control;
pub mod error;
pub mod varint;

pub use channel::{channel_name, is_reserved, ChannelId, CONTROL_CHANNEL};
pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD};
pub use control::{
    control_frame, decode_control, encode_control, ControlCommand, CMD_CLOSE_CHANNEL,
    CMD_OPEN_CHANNEL,
};
pub use error::{FrameError, Result};
