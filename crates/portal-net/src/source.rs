//! Decoding side of a framed stream, and the pump that feeds a channel from it.

use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::{self, CodecConfig};
use crate::error::LinkError;
use crate::framing::read_frame;
use crate::messages::Message;

/// Reads framed messages from an async byte stream.
pub struct FramedSource<R> {
    reader: BufReader<R>,
    config: CodecConfig,
}

impl<R: AsyncRead + Unpin + Send> FramedSource<R> {
    /// Wrap `reader` with an internal read buffer.
    pub fn new(reader: R, config: CodecConfig) -> Self {
        Self {
            reader: BufReader::new(reader),
            config,
        }
    }

    /// Read and decode the next message; `Ok(None)` on a clean end of stream.
    pub async fn next_message(&mut self) -> Result<Option<Message>, LinkError> {
        match read_frame(&mut self.reader, &self.config.frame).await? {
            Some(payload) => Ok(Some(codec::decode(&payload)?)),
            None => Ok(None),
        }
    }
}

/// Move decoded messages from `source` into `tx` until told to stop.
///
/// Returns `Ok(())` when `stop` fires or the receiving side goes away, and
/// [`LinkError::Closed`] when the peer ends the stream. Intended to run under
/// a [`crate::Lifecycle`].
pub async fn pump<R: AsyncRead + Unpin + Send>(
    mut source: FramedSource<R>,
    tx: mpsc::Sender<Message>,
    stop: CancellationToken,
) -> Result<(), LinkError> {
    loop {
        let msg = tokio::select! {
            () = stop.cancelled() => return Ok(()),
            next = source.next_message() => next?.ok_or(LinkError::Closed)?,
        };
        tokio::select! {
            () = stop.cancelled() => return Ok(()),
            sent = tx.send(msg) => {
                if sent.is_err() {
                    return Ok(());
                }
            }
        }
    }
}
