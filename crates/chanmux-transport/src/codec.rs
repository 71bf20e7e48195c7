use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Result, TransportError};
use crate::message::{Message, MessageKind};

/// Envelope header: magic (2) + length (4) + kind (1) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Magic bytes: "CM" (0x43 0x4D).
pub const MAGIC: [u8; 2] = [0x43, 0x4D];

/// Default maximum message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Configuration for [`MessageCodec`].
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum message data size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// Carries discrete [`Message`]s over a byte stream.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Kind     │ Data             │
/// │ 0x43 0x4D    │ (4B LE)  │ (1B)     │ (Length bytes)   │
/// │ "CM"         │          │          │                  │
/// └──────────────┴───────────┴──────────┴─────────────────┘
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    config: CodecConfig,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if src.len() < HEADER_SIZE {
            return Ok(None); // Need more data
        }

        if src[0..2] != MAGIC {
            return Err(TransportError::InvalidMagic);
        }

        let len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if len > self.config.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.config.max_message_size,
            });
        }
        let kind = MessageKind::from_byte(src[6]).ok_or(TransportError::UnknownMessageKind(src[6]))?;

        let total = HEADER_SIZE + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None); // Need more data
        }

        src.advance(HEADER_SIZE);
        let data = src.split_to(len).freeze();
        Ok(Some(Message { kind, data }))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        let len = message.data.len();
        if len > self.config.max_message_size || len > u32::MAX as usize {
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.config.max_message_size.min(u32::MAX as usize),
            });
        }
        dst.reserve(HEADER_SIZE + len);
        dst.put_slice(&MAGIC);
        dst.put_u32_le(len as u32);
        dst.put_u8(message.kind.to_byte());
        dst.put_slice(&message.data);
        Ok(())
    }
}
