/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The input ended before a varint terminating byte was seen.
    #[error("incomplete number")]
    IncompleteNumber,

    /// The varint does not fit in 64 bits.
    #[error("number overflows 64 bits")]
    NumberOverflow,

    /// A control frame carried no command byte.
    #[error("empty control message")]
    EmptyControlMessage,

    /// A control frame carried a command byte this side does not implement.
    #[error("unknown control command {0}")]
    UnknownControlCommand(u8),

    /// A control command's argument could not be decoded.
    #[error("malformed argument for control command {command}: {source}")]
    MalformedControlArgument {
        command: u8,
        #[source]
        source: Box<FrameError>,
    },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
