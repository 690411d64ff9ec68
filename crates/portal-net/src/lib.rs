//! Wire layer of the proxy: messages, framing, compression, buffered sinks,
//! upstream dialing and supervision of the background readers.

pub mod codec;
pub mod compression;
pub mod error;
pub mod framing;
pub mod lifecycle;
pub mod messages;
pub mod sink;
pub mod source;
pub mod upstream;

pub use codec::{CodecConfig, CodecError};
pub use compression::{CompressionConfig, CompressionError};
pub use error::LinkError;
pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use lifecycle::Lifecycle;
pub use messages::{
    ALTERNATE_DIMENSION, Direction, GAME_MODE_CHANGED, JoinWorld, Message, MessageTag,
    PRIMARY_DIMENSION, Respawn, TabListEntry,
};
pub use sink::{FramedSink, PacketSink, SharedSink};
pub use source::{FramedSource, pump};
pub use upstream::{
    DEFAULT_INCOMING_CAPACITY, TcpConnector, UpstreamConnection, UpstreamConnector, UpstreamLink,
};
