//! Buffered, ordered message sinks.
//!
//! A [`PacketSink`] accepts messages one at a time without delivering them;
//! [`PacketSink::flush`] pushes everything written so far onto the wire. The
//! proxy relies on this to emit multi-message bursts atomically from the
//! peer's point of view.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

use crate::codec::{self, CodecConfig};
use crate::error::LinkError;
use crate::framing::write_frame;
use crate::messages::Message;

/// Destination for messages travelling in one direction.
#[async_trait]
pub trait PacketSink: Send {
    /// Queue `msg` behind everything written before it. Not flushed.
    async fn write(&mut self, msg: &Message) -> Result<(), LinkError>;

    /// Deliver every queued message.
    async fn flush(&mut self) -> Result<(), LinkError>;
}

/// [`PacketSink`] that frames messages onto an async byte stream.
pub struct FramedSink<W> {
    writer: BufWriter<W>,
    config: CodecConfig,
}

impl<W: AsyncWrite + Unpin + Send> FramedSink<W> {
    /// Wrap `writer` with an internal write buffer.
    pub fn new(writer: W, config: CodecConfig) -> Self {
        Self {
            writer: BufWriter::new(writer),
            config,
        }
    }

    /// Flush pending bytes and shut the write side down.
    pub async fn shutdown(&mut self) -> Result<(), LinkError> {
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Move the sink behind a mutex so a connection handle can close it.
    pub fn into_shared(self) -> SharedSink<W> {
        SharedSink(Arc::new(Mutex::new(self)))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PacketSink for FramedSink<W> {
    async fn write(&mut self, msg: &Message) -> Result<(), LinkError> {
        let payload = codec::encode(msg, &self.config)?;
        write_frame(&mut self.writer, &payload, &self.config.frame).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// A [`FramedSink`] shared between the writer handed out to the session and
/// the connection handle that eventually shuts it down.
pub struct SharedSink<W>(Arc<Mutex<FramedSink<W>>>);

impl<W> Clone for SharedSink<W> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<W: AsyncWrite + Unpin + Send> SharedSink<W> {
    /// Shut down the underlying stream.
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        self.0.lock().await.shutdown().await
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> PacketSink for SharedSink<W> {
    async fn write(&mut self, msg: &Message) -> Result<(), LinkError> {
        self.0.lock().await.write(msg).await
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        self.0.lock().await.flush().await
    }
}
