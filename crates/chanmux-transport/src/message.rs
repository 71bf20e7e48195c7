use std::fmt;

use bytes::Bytes;

/// Class of a transport message.
///
/// The byte values match the websocket opcodes for the same message classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Binary,
    Close,
}

impl MessageKind {
    /// Wire byte for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            MessageKind::Text => 0x01,
            MessageKind::Binary => 0x02,
            MessageKind::Close => 0x08,
        }
    }

    /// Parse a wire byte, returning `None` for unknown kinds.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageKind::Text),
            0x02 => Some(MessageKind::Binary),
            0x08 => Some(MessageKind::Close),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Text => "text",
            MessageKind::Binary => "binary",
            MessageKind::Close => "close",
        };
        f.write_str(name)
    }
}

/// One discrete message carried by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub data: Bytes,
}

impl Message {
    /// Create a binary message.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Binary,
            data: data.into(),
        }
    }

    /// Create a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            data: Bytes::from(text.into()),
        }
    }

    /// Create a close message.
    pub fn close() -> Self {
        Self {
            kind: MessageKind::Close,
            data: Bytes::new(),
        }
    }

    pub fn is_binary(&self) -> bool {
        self.kind == MessageKind::Binary
    }

    pub fn is_close(&self) -> bool {
        self.kind == MessageKind::Close
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} message ({} bytes)", self.kind, self.data.len())
    }
}
