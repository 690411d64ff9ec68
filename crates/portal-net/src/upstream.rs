//! Establishing links to backend servers.
//!
//! [`UpstreamConnector::connect`] returns an [`UpstreamLink`]: the connection
//! handle, a writer for server-bound messages, the channel the background
//! reader fills with client-bound messages, and the [`Lifecycle`] of that
//! reader. The four always travel together.

use std::fmt;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

use crate::codec::CodecConfig;
use crate::error::LinkError;
use crate::lifecycle::Lifecycle;
use crate::messages::Message;
use crate::sink::{FramedSink, PacketSink, SharedSink};
use crate::source::{FramedSource, pump};

/// Default capacity of the channel between the background reader and the
/// session.
pub const DEFAULT_INCOMING_CAPACITY: usize = 256;

/// The socket side of an upstream link.
#[async_trait]
pub trait UpstreamConnection: Send {
    /// Close the connection. The writer handed out with it becomes unusable.
    async fn close(&mut self) -> Result<(), LinkError>;
}

/// A live connection to one backend server.
pub struct UpstreamLink {
    /// Server name the link was opened for.
    pub name: String,
    /// Address that was dialed.
    pub address: String,
    /// Socket handle.
    pub connection: Box<dyn UpstreamConnection>,
    /// Server-bound sink.
    pub writer: Box<dyn PacketSink>,
    /// Client-bound messages decoded by the background reader.
    pub incoming: mpsc::Receiver<Message>,
    /// Supervisor of the background reader.
    pub lifecycle: Lifecycle,
}

impl fmt::Debug for UpstreamLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamLink")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

/// Opens [`UpstreamLink`]s.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Dial `address` on behalf of server `name`.
    async fn connect(&self, name: &str, address: &str) -> Result<UpstreamLink, LinkError>;
}

/// Dials backend servers over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    codec: CodecConfig,
    incoming_capacity: usize,
}

impl TcpConnector {
    /// Create a connector that frames with `codec` and buffers up to
    /// `incoming_capacity` decoded messages per link.
    pub fn new(codec: CodecConfig, incoming_capacity: usize) -> Self {
        Self {
            codec,
            incoming_capacity: incoming_capacity.max(1),
        }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(CodecConfig::default(), DEFAULT_INCOMING_CAPACITY)
    }
}

#[async_trait]
impl UpstreamConnector for TcpConnector {
    async fn connect(&self, name: &str, address: &str) -> Result<UpstreamLink, LinkError> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|source| LinkError::Connect {
                address: address.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        tracing::debug!(server = %name, %address, "upstream connected");

        let (reader, writer) = stream.into_split();
        let sink = FramedSink::new(writer, self.codec.clone()).into_shared();
        let source = FramedSource::new(reader, self.codec.clone());
        let (tx, incoming) = mpsc::channel(self.incoming_capacity);
        let lifecycle = Lifecycle::spawn(move |stop| pump(source, tx, stop));

        Ok(UpstreamLink {
            name: name.to_string(),
            address: address.to_string(),
            connection: Box::new(TcpUpstream { sink: sink.clone() }),
            writer: Box::new(sink),
            incoming,
            lifecycle,
        })
    }
}

/// TCP connection handle; closing it shuts down the shared write half.
struct TcpUpstream {
    sink: SharedSink<OwnedWriteHalf>,
}

#[async_trait]
impl UpstreamConnection for TcpUpstream {
    async fn close(&mut self) -> Result<(), LinkError> {
        self.sink.shutdown().await
    }
}
