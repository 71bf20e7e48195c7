use std::future::Future;

use bytes::Bytes;

use crate::error::Result;
use crate::message::Message;

/// Receiving half of a message transport.
pub trait MessageReader: Send + 'static {
    /// Read the next message.
    ///
    /// Returns `Ok(None)` once the peer has ended the stream.
    fn read(&mut self) -> impl Future<Output = Result<Option<Message>>> + Send;
}

/// Sending half of a message transport.
pub trait MessageWriter: Send + 'static {
    /// Write one message of any kind.
    fn write(&mut self, message: Message) -> impl Future<Output = Result<()>> + Send;

    /// Write one binary message.
    fn write_binary(&mut self, data: Bytes) -> impl Future<Output = Result<()>> + Send {
        self.write(Message::binary(data))
    }

    /// Signal a graceful close to the peer and release the sending side.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// A duplex message transport that can be split into independently owned halves.
///
/// The multiplexer reads from one half and writes from another task, so every
/// transport is consumed by `split`.
pub trait MessageTransport: Send + 'static {
    type Reader: MessageReader;
    type Writer: MessageWriter;

    fn split(self) -> (Self::Reader, Self::Writer);
}
