//! Errors raised by connections, sinks and background readers.

use crate::codec::CodecError;
use crate::framing::FrameError;

/// A failure on one side of a proxied connection.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Dialing the remote address failed.
    #[error("connect to {address} failed: {source}")]
    Connect {
        /// Address that was dialed.
        address: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    Closed,

    /// Encoding or decoding a message failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(io) => LinkError::Io(io),
            other => LinkError::Codec(CodecError::Frame(other)),
        }
    }
}
