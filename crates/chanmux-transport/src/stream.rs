use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::{CodecConfig, MessageCodec};
use crate::error::Result;
use crate::message::Message;
use crate::traits::{MessageReader, MessageTransport, MessageWriter};

/// A message transport over any async byte stream, framed by [`MessageCodec`].
pub struct StreamTransport<S> {
    stream: S,
    config: CodecConfig,
}

/// Receiving half of a [`StreamTransport`].
pub struct StreamReader<S> {
    inner: FramedRead<ReadHalf<S>, MessageCodec>,
}

/// Sending half of a [`StreamTransport`].
pub struct StreamWriter<S> {
    inner: FramedWrite<WriteHalf<S>, MessageCodec>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a byte stream with the default codec configuration.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, CodecConfig::default())
    }

    /// Wrap a byte stream with explicit codec configuration.
    pub fn with_config(stream: S, config: CodecConfig) -> Self {
        Self { stream, config }
    }
}

impl<S> MessageTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = StreamReader<S>;
    type Writer = StreamWriter<S>;

    fn split(self) -> (StreamReader<S>, StreamWriter<S>) {
        let (read, write) = tokio::io::split(self.stream);
        let reader = StreamReader {
            inner: FramedRead::new(read, MessageCodec::with_config(self.config.clone())),
        };
        let writer = StreamWriter {
            inner: FramedWrite::new(write, MessageCodec::with_config(self.config)),
        };
        (reader, writer)
    }
}

impl<S> MessageReader for StreamReader<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn read(&mut self) -> Result<Option<Message>> {
        self.inner.next().await.transpose()
    }
}

impl<S> MessageWriter for StreamWriter<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn write(&mut self, message: Message) -> Result<()> {
        self.inner.send(message).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.send(Message::close()).await?;
        self.inner.close().await
    }
}

impl<S> std::fmt::Debug for StreamTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("max_message_size", &self.config.max_message_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn messages_cross_a_duplex_stream() {
        let (left, right) = tokio::io::duplex(1024);
        let (_left_reader, mut left_writer) = StreamTransport::new(left).split();
        let (mut right_reader, _right_writer) = StreamTransport::new(right).split();

        left_writer
            .write_binary(Bytes::from_static(b"one"))
            .await
            .unwrap();
        left_writer.write(Message::text("two")).await.unwrap();
        left_writer.close().await.unwrap();

        let first = right_reader.read().await.unwrap().unwrap();
        assert!(first.is_binary());
        assert_eq!(first.data.as_ref(), b"one");

        let second = right_reader.read().await.unwrap().unwrap();
        assert_eq!(second, Message::text("two"));

        let third = right_reader.read().await.unwrap().unwrap();
        assert!(third.is_close());

        assert!(right_reader.read().await.unwrap().is_none());
    }
}
