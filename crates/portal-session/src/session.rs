//! Per-client session context.
//!
//! A [`Session`] is owned by exactly one [`crate::SessionExecutor`] task and
//! handed by `&mut` to each command in turn, so no command ever observes
//! another command's partial mutations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use portal_net::{Direction, Message, PacketSink, UpstreamConnector, UpstreamLink};
use tracing::debug;

use crate::error::SessionError;
use crate::hooks::PacketHooks;
use crate::tab_list::TabList;
use crate::trace::TraceSink;

/// How long an injected end-of-stream waits before the session is torn
/// down, giving the network time to deliver the flushed burst.
pub const DEFAULT_EOF_LINGER: Duration = Duration::from_secs(1);

/// Unique identifier for a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Delay applied before returning an injected end-of-stream.
    pub eof_linger: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            eof_linger: DEFAULT_EOF_LINGER,
        }
    }
}

/// State of one proxied client.
pub struct Session {
    id: SessionId,
    pub(crate) upstream: Option<UpstreamLink>,
    pub(crate) downstream: Box<dyn PacketSink>,
    pub(crate) tab_list: TabList,
    pub(crate) trace: Option<TraceSink>,
    pub(crate) connector: Arc<dyn UpstreamConnector>,
    pub(crate) hooks: Arc<PacketHooks>,
    pub(crate) settings: SessionSettings,
}

impl Session {
    /// Create a session writing client-bound messages to `downstream` and
    /// dialing backends through `connector`. No upstream is attached yet.
    pub fn new(
        id: SessionId,
        downstream: Box<dyn PacketSink>,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Self {
        Self {
            id,
            upstream: None,
            downstream,
            tab_list: TabList::new(),
            trace: None,
            connector,
            hooks: Arc::new(PacketHooks::new()),
            settings: SessionSettings::default(),
        }
    }

    /// Attach the initial upstream.
    pub fn with_upstream(mut self, link: UpstreamLink) -> Self {
        self.upstream = Some(link);
        self
    }

    /// Use `hooks` for every message that passes through.
    pub fn with_hooks(mut self, hooks: Arc<PacketHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Record a packet trace.
    pub fn with_trace(mut self, trace: TraceSink) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Override the default settings.
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The live upstream, if any.
    pub fn upstream(&self) -> Option<&UpstreamLink> {
        self.upstream.as_ref()
    }

    /// Mirror of the client's tab list.
    pub fn tab_list(&self) -> &TabList {
        &self.tab_list
    }

    /// Mutable mirror of the client's tab list.
    pub fn tab_list_mut(&mut self) -> &mut TabList {
        &mut self.tab_list
    }

    /// Stop the upstream reader, close the connection, then drop the link.
    ///
    /// The stop request comes first so the reader never pushes into a
    /// channel nobody drains, and the socket is closed only once the reader
    /// has been told to let go of it. No-op without an upstream.
    pub(crate) async fn teardown_upstream(&mut self) -> Result<(), SessionError> {
        if let Some(link) = self.upstream.as_mut() {
            debug!(session = %self.id, server = %link.name, "stopping upstream");
            link.lifecycle.stop(None);
            link.connection.close().await.map_err(SessionError::Close)?;
        }
        self.upstream = None;
        Ok(())
    }

    /// Tell the client why it is about to be dropped. Best-effort.
    pub(crate) async fn kick(&mut self, reason: &str) {
        let kick = Message::kick(reason);
        self.record(&kick, "kick", Direction::ClientBound);
        let sent = match self.downstream.write(&kick).await {
            Ok(()) => self.downstream.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!(session = %self.id, error = %e, "kick could not be delivered");
        }
    }

    pub(crate) fn record(&mut self, msg: &Message, origin: &str, direction: Direction) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(origin, direction, msg);
        }
    }

    /// Deliver a message read from the upstream to the client.
    pub(crate) async fn forward_to_client(&mut self, msg: Message) -> Result<(), SessionError> {
        self.hooks.dispatch(&msg).map_err(SessionError::Hook)?;
        self.tab_list.track(&msg);
        self.record(&msg, "upstream", Direction::ClientBound);
        self.downstream.write(&msg).await?;
        self.downstream.flush().await?;
        Ok(())
    }

    /// Deliver a message read from the client to the upstream, if any.
    pub(crate) async fn forward_to_server(&mut self, msg: Message) -> Result<(), SessionError> {
        self.record(&msg, "downstream", Direction::ServerBound);
        let Some(link) = self.upstream.as_mut() else {
            debug!(session = %self.id, tag = %msg.tag(), "no upstream, dropping message");
            return Ok(());
        };
        link.writer.write(&msg).await?;
        link.writer.flush().await?;
        Ok(())
    }
}

/// Why the reader behind `link` went away. Waits for it to be fully dead
/// so its terminal error, if any, is visible.
pub(crate) async fn upstream_gone(link: &mut UpstreamLink) -> SessionError {
    link.lifecycle.dead().await;
    link.lifecycle
        .terminal_error()
        .map_or(SessionError::UpstreamStopped, SessionError::Upstream)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("upstream", &self.upstream)
            .field("tab_list", &self.tab_list.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
