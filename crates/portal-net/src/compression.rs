//! Threshold-based LZ4 compression of message payloads.
//!
//! Every payload handed to the framing layer starts with a one-byte marker:
//! [`MARKER_PLAIN`] for bodies below the threshold, [`MARKER_LZ4`] for bodies
//! compressed with a prepended size.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// Body follows uncompressed.
pub const MARKER_PLAIN: u8 = 0x00;

/// Body is LZ4-compressed with its decompressed size prepended.
pub const MARKER_LZ4: u8 = 0x01;

/// Controls when payloads are compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Smallest body (bytes) that gets compressed; `None` disables
    /// compression entirely. Default: 256.
    pub threshold: Option<usize>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            threshold: Some(256),
        }
    }
}

impl CompressionConfig {
    fn compresses(&self, len: usize) -> bool {
        self.threshold.is_some_and(|t| len >= t)
    }
}

/// Errors that can occur while unpacking a payload.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// No marker byte.
    #[error("empty payload, missing compression marker")]
    MissingMarker,
    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),
    /// The marker byte is not one we write.
    #[error("unknown compression marker: 0x{0:02X}")]
    UnknownMarker(u8),
    /// The body decompressed to fewer bytes than its size prefix claims.
    #[error("LZ4 body holds {actual} bytes, prefix claims {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Prefix `body` with a marker, compressing it when it crosses the threshold.
pub fn pack(body: &[u8], config: &CompressionConfig) -> Vec<u8> {
    if config.compresses(body.len()) {
        let compressed = compress_prepend_size(body);
        let mut out = Vec::with_capacity(1 + compressed.len());
        out.push(MARKER_LZ4);
        out.extend_from_slice(&compressed);
        out
    } else {
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(MARKER_PLAIN);
        out.extend_from_slice(body);
        out
    }
}

/// Strip the marker from `payload` and decompress if needed.
pub fn unpack(payload: &[u8]) -> Result<Vec<u8>, CompressionError> {
    match payload.split_first() {
        None => Err(CompressionError::MissingMarker),
        Some((&MARKER_PLAIN, body)) => Ok(body.to_vec()),
        Some((&MARKER_LZ4, body)) => {
            let out = decompress_size_prepended(body)?;
            // The prefix is present, otherwise decompression already failed.
            let expected = body
                .first_chunk::<4>()
                .map_or(0, |prefix| u32::from_le_bytes(*prefix) as usize);
            if out.len() != expected {
                return Err(CompressionError::SizeMismatch {
                    expected,
                    actual: out.len(),
                });
            }
            Ok(out)
        }
        Some((&marker, _)) => Err(CompressionError::UnknownMarker(marker)),
    }
}
