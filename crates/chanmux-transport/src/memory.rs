use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::message::Message;
use crate::traits::{MessageReader, MessageTransport, MessageWriter};

/// Number of messages buffered per direction.
pub const MEMORY_QUEUE_DEPTH: usize = 64;

/// In-process duplex transport.
///
/// Created in connected pairs; whatever one end writes, the other end reads.
#[derive(Debug)]
pub struct MemoryTransport {
    reader: MemoryReader,
    writer: MemoryWriter,
}

/// Receiving half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryReader {
    rx: mpsc::Receiver<Message>,
    closed: bool,
}

/// Sending half of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryWriter {
    tx: Option<mpsc::Sender<Message>>,
}

impl MemoryTransport {
    /// Create two connected transports.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(MEMORY_QUEUE_DEPTH);
        let (b_tx, b_rx) = mpsc::channel(MEMORY_QUEUE_DEPTH);
        let a = Self {
            reader: MemoryReader {
                rx: b_rx,
                closed: false,
            },
            writer: MemoryWriter { tx: Some(a_tx) },
        };
        let b = Self {
            reader: MemoryReader {
                rx: a_rx,
                closed: false,
            },
            writer: MemoryWriter { tx: Some(b_tx) },
        };
        (a, b)
    }
}

impl MessageTransport for MemoryTransport {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (self.reader, self.writer)
    }
}

impl MessageReader for MemoryReader {
    async fn read(&mut self) -> Result<Option<Message>> {
        if self.closed {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(message) => {
                if message.is_close() {
                    self.closed = true;
                }
                Ok(Some(message))
            }
            None => {
                self.closed = true;
                Ok(None)
            }
        }
    }
}

impl MessageWriter for MemoryWriter {
    async fn write(&mut self, message: Message) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).await.map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            // The peer may already be gone; closing is still complete.
            if tx.send(Message::close()).await.is_err() {
                debug!("memory transport peer dropped before close");
            }
        }
        Ok(())
    }
}

impl MemoryWriter {
    /// Whether `close` has been called on this writer.
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}
