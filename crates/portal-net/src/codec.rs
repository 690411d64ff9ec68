//! Message ⇄ frame payload conversion: serialization plus compression.

use crate::compression::{self, CompressionConfig, CompressionError};
use crate::framing::{FrameConfig, FrameError};
use crate::messages::{self, Message, MessageError};

/// Settings shared by every encoder and decoder of one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecConfig {
    /// Frame size limits.
    pub frame: FrameConfig,
    /// Compression threshold.
    pub compression: CompressionConfig,
}

/// Any failure turning bytes into messages or back.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Framing failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Compression marker or LZ4 body was invalid.
    #[error(transparent)]
    Compression(#[from] CompressionError),
    /// Message body could not be (de)serialized.
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Encode `msg` into a frame payload.
pub fn encode(msg: &Message, config: &CodecConfig) -> Result<Vec<u8>, CodecError> {
    let body = messages::serialize_message(msg)?;
    Ok(compression::pack(&body, &config.compression))
}

/// Decode a frame payload into a message.
pub fn decode(payload: &[u8]) -> Result<Message, CodecError> {
    let body = compression::unpack(payload)?;
    Ok(messages::deserialize_message(&body)?)
}
