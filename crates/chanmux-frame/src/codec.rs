use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::ChannelId;
use crate::error::{FrameError, Result};
use crate::varint;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A framed message with channel routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: ChannelId,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: ChannelId, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (id prefix + payload).
    pub fn wire_size(&self) -> usize {
        varint::encoded_len(self.channel) + self.payload.len()
    }

    /// Encode this frame into a standalone buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        encode_frame(self.channel, &self.payload, &mut buf);
        buf.freeze()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (one frame per transport message):
/// ```text
/// ┌──────────────────────┬──────────────────────┐
/// │ Channel id (varint)  │ Payload              │
/// │ 1..=10 bytes         │ rest of the message  │
/// └──────────────────────┴──────────────────────┘
/// ```
pub fn encode_frame(channel: ChannelId, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(varint::encoded_len(channel) + payload.len());
    varint::encode_into(channel, dst);
    dst.put_slice(payload);
}

/// Decode one frame from a complete transport message.
///
/// The payload is a zero-copy slice of `data`.
pub fn decode_frame(data: Bytes, max_payload: usize) -> Result<Frame> {
    let (channel, rest) = varint::decode(&data)?;
    if rest.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: rest.len(),
            max: max_payload,
        });
    }
    let offset = data.len() - rest.len();
    Ok(Frame {
        channel,
        payload: data.slice(offset..),
    })
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl FrameConfig {
    /// Reject payloads above the configured maximum.
    pub fn check_payload(&self, len: usize) -> Result<()> {
        if len > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.max_payload_size,
            });
        }
        Ok(())
    }
}
