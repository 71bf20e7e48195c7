//! Message transport contract and reference transports for chanmux.
//!
//! The multiplexer consumes any duplex transport that delivers discrete,
//! kind-tagged messages:
//! - [`MemoryTransport`] — in-process pairs (tests, embedding)
//! - [`StreamTransport`] — any async byte stream framed by [`MessageCodec`]
//! - [`UnixDomainSocket`] — listener/connector producing stream transports
//!
//! This is the lowest layer of chanmux. Everything else builds on the
//! [`MessageTransport`] trait provided here.

pub mod codec;
pub mod error;
pub mod memory;
pub mod message;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use codec::{CodecConfig, MessageCodec, DEFAULT_MAX_MESSAGE};
pub use error::{Result, TransportError};
pub use memory::{MemoryReader, MemoryTransport, MemoryWriter};
pub use message::{Message, MessageKind};
pub use stream::{StreamReader, StreamTransport, StreamWriter};
pub use traits::{MessageReader, MessageTransport, MessageWriter};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
