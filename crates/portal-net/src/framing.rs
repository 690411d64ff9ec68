//! Length-prefixed framing for byte streams.
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does not include the prefix itself. Writes are not flushed;
//! callers batch frames and flush once.

use std::io::ErrorKind;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Configuration for the framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum allowed payload size in bytes. Default: 1 MiB.
    pub max_payload_size: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1 << 20,
        }
    }
}

/// Errors that can occur during framing operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds the configured maximum.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// The actual payload size.
        size: usize,
        /// The configured maximum.
        max: u32,
    },

    /// The peer closed the stream in the middle of a frame.
    #[error("stream ended inside a frame")]
    Truncated,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read a single frame.
///
/// Returns `Ok(None)` when the stream ends cleanly before a new frame starts.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(FrameError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf);
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len as usize,
            max: config.max_payload_size,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            FrameError::Truncated
        } else {
            FrameError::Io(e)
        }
    })?;

    Ok(Some(payload))
}

/// Write a single frame without flushing.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    config: &FrameConfig,
) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= config.max_payload_size)
        .ok_or(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: config.max_payload_size,
        })?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}
