//! Client-facing listener: accepts clients and runs one session per client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use portal_config::Config;
use portal_net::{
    CodecConfig, CompressionConfig, FrameConfig, FramedSink, FramedSource, Lifecycle, Message,
    PacketSink, TcpConnector, UpstreamConnector, pump,
};
use portal_session::{
    Command, CommandHandle, PacketHooks, Session, SessionExecutor, SessionId, SessionSettings,
    TraceSink, command_channel,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, warn};

/// Pending commands a session may have queued before senders wait.
const COMMAND_QUEUE: usize = 16;

/// Atomic generator for monotonically increasing [`SessionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`SessionId`].
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when the registry is at capacity.
#[derive(Debug, thiserror::Error)]
#[error("session limit reached")]
pub struct SessionLimitReached;

/// A live session as seen from outside its task.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Client address.
    pub peer: SocketAddr,
    /// Where to send commands for this session.
    pub commands: CommandHandle,
}

/// Thread-safe map of live sessions keyed by [`SessionId`].
pub struct SessionRegistry {
    inner: RwLock<HashMap<SessionId, SessionEntry>>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Create a new registry with the given capacity limit.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Register a session. Returns `Err` if the registry is at capacity.
    pub async fn insert(
        &self,
        id: SessionId,
        entry: SessionEntry,
    ) -> Result<(), SessionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_sessions {
            return Err(SessionLimitReached);
        }
        map.insert(id, entry);
        Ok(())
    }

    /// Remove a session by ID.
    pub async fn remove(&self, id: &SessionId) -> Option<SessionEntry> {
        self.inner.write().await.remove(id)
    }

    /// Command handle of session `id`.
    pub async fn get(&self, id: &SessionId) -> Option<CommandHandle> {
        self.inner.read().await.get(id).map(|e| e.commands.clone())
    }

    /// Every live session, ordered by ID.
    pub async fn list(&self) -> Vec<(SessionId, SocketAddr)> {
        let mut sessions: Vec<_> = self
            .inner
            .read()
            .await
            .iter()
            .map(|(id, entry)| (*id, entry.peer))
            .collect();
        sessions.sort_by_key(|(id, _)| *id);
        sessions
    }

    /// Queue a kick for every live session.
    pub async fn kick_all(&self, reason: &str) {
        let handles: Vec<_> = self
            .inner
            .read()
            .await
            .values()
            .map(|e| e.commands.clone())
            .collect();
        for handle in handles {
            // Sessions that already ended are skipped.
            let _ = handle.send(Command::kick(reason)).await;
        }
    }

    /// Return the number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Accepts clients and runs a session for each.
pub struct Proxy {
    config: Arc<Config>,
    codec: CodecConfig,
    connector: Arc<dyn UpstreamConnector>,
    hooks: Arc<PacketHooks>,
    sessions: Arc<SessionRegistry>,
    id_gen: Arc<IdGenerator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Proxy {
    /// Create a proxy dialing backends over TCP.
    pub fn new(config: Config) -> Self {
        let codec = codec_config(&config);
        let connector = TcpConnector::new(codec.clone(), config.session.incoming_capacity);
        Self::with_connector(config, Arc::new(connector))
    }

    /// Create a proxy dialing backends through `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn UpstreamConnector>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            codec: codec_config(&config),
            sessions: Arc::new(SessionRegistry::new(config.listener.max_clients)),
            config: Arc::new(config),
            connector,
            hooks: Arc::new(PacketHooks::new()),
            id_gen: Arc::new(IdGenerator::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Run `hooks` in every session.
    pub fn with_hooks(mut self, hooks: PacketHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Live sessions.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    /// Bind to the configured address and run the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let address = self.config.listener.socket_address();
        let listener = TcpListener::bind(&address).await?;
        info!("Proxy listening on {address}");
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = result?;
                    let client = Client {
                        id: self.id_gen.next_id(),
                        peer,
                        config: Arc::clone(&self.config),
                        codec: self.codec.clone(),
                        connector: Arc::clone(&self.connector),
                        hooks: Arc::clone(&self.hooks),
                        sessions: Arc::clone(&self.sessions),
                    };
                    tokio::spawn(client.serve(stream));
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Proxy shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Stop accepting clients.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Codec settings derived from the session config.
fn codec_config(config: &Config) -> CodecConfig {
    CodecConfig {
        frame: FrameConfig::default(),
        compression: CompressionConfig {
            threshold: config.session.compression_threshold,
        },
    }
}

/// Everything one accepted client needs.
struct Client {
    id: SessionId,
    peer: SocketAddr,
    config: Arc<Config>,
    codec: CodecConfig,
    connector: Arc<dyn UpstreamConnector>,
    hooks: Arc<PacketHooks>,
    sessions: Arc<SessionRegistry>,
}

impl Client {
    async fn serve(self, stream: TcpStream) {
        let id = self.id;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(session = %id, error = %e, "could not disable Nagle");
        }
        let (reader, writer) = stream.into_split();
        let mut downstream = FramedSink::new(writer, self.codec.clone());

        let (handle, commands) = command_channel(COMMAND_QUEUE);
        let entry = SessionEntry {
            peer: self.peer,
            commands: handle.clone(),
        };
        if self.sessions.insert(id, entry).await.is_err() {
            warn!("Session limit reached, rejecting {}", self.peer);
            let full = Message::kick("The proxy is full");
            if downstream.write(&full).await.is_ok() {
                let _ = downstream.flush().await;
            }
            return;
        }
        info!(session = %id, peer = %self.peer, "client connected");

        let (tx, from_client) = mpsc::channel(self.config.session.incoming_capacity.max(1));
        let source = FramedSource::new(reader, self.codec.clone());
        let client_reader = Lifecycle::spawn(move |stop| pump(source, tx, stop));

        let session = self.build_session(Box::new(downstream));

        // The first reconnect attaches the default server.
        if let Some(server) = self.config.server(&self.config.default_server) {
            let _ = handle
                .send(Command::reconnect(&server.name, &server.address))
                .await;
        } else {
            warn!(
                session = %id,
                server = %self.config.default_server,
                "default server is not configured"
            );
        }
        drop(handle);

        let reason = SessionExecutor::new(session, commands, from_client).run().await;

        client_reader.stop(None);
        self.sessions.remove(&id).await;
        info!(session = %id, reason = %reason, "client disconnected");
    }

    fn build_session(&self, downstream: Box<dyn PacketSink>) -> Session {
        let mut session = Session::new(self.id, downstream, Arc::clone(&self.connector))
            .with_hooks(Arc::clone(&self.hooks))
            .with_settings(SessionSettings {
                eof_linger: self.config.session.eof_linger(),
            });

        if let Some(dir) = &self.config.session.trace_dir {
            let path = dir.join(format!("session-{}.trace", self.id.0));
            match std::fs::create_dir_all(dir).and_then(|()| TraceSink::create(&path)) {
                Ok(trace) => session = session.with_trace(trace),
                Err(e) => {
                    warn!(
                        session = %self.id,
                        path = %path.display(),
                        error = %e,
                        "packet trace disabled"
                    );
                }
            }
        }
        session
    }
}
