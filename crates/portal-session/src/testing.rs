//! Test doubles for sessions: recording sinks, a scripted connector and a
//! shared event log that captures the order of side effects across them.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use portal_net::{
    JoinWorld, Lifecycle, LinkError, Message, MessageTag, PacketSink, TabListEntry,
    UpstreamConnection, UpstreamConnector, UpstreamLink,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::session::{Session, SessionId};

/// One observable side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `connect(name, address)` was called.
    Connect(String, String),
    /// Connection `name` was closed; `true` if its reader had already been
    /// asked to stop.
    Close(String, bool),
    ClientWrite(MessageTag),
    ClientFlush,
    ServerWrite(MessageTag),
    ServerFlush,
    Hook(MessageTag),
    Trace(String),
}

/// Shared, ordered record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Client,
    Server,
}

#[derive(Debug, Default)]
struct SinkState {
    messages: Vec<Message>,
    writes: usize,
    flushes: usize,
    flushed_len: usize,
    fail_write_at: Option<(usize, String)>,
    fail_flush: Option<String>,
}

/// [`PacketSink`] that remembers what it was given.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
    log: EventLog,
    side: Side,
}

impl RecordingSink {
    /// Client-side sink with its own event log.
    pub fn new() -> Self {
        Self::with_log(&EventLog::new())
    }

    /// Client-side sink reporting into `log`.
    pub fn with_log(log: &EventLog) -> Self {
        Self::on_side(log, Side::Client)
    }

    /// Server-side sink reporting into `log`.
    pub fn upstream(log: &EventLog) -> Self {
        Self::on_side(log, Side::Server)
    }

    fn on_side(log: &EventLog, side: Side) -> Self {
        Self {
            state: Arc::default(),
            log: log.clone(),
            side,
        }
    }

    /// Make the `step`-th write (1-based) fail with `reason`.
    pub fn fail_write_at(&self, step: usize, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_write_at = Some((step, reason.into()));
    }

    /// Make every flush fail with `reason`.
    pub fn fail_flush(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().fail_flush = Some(reason.into());
    }

    /// Messages accepted so far, flushed or not.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn tags(&self) -> Vec<MessageTag> {
        self.messages().iter().map(Message::tag).collect()
    }

    /// Successful flushes.
    pub fn flushes(&self) -> usize {
        self.state.lock().unwrap().flushes
    }

    /// How many messages had been accepted at the last successful flush.
    pub fn flushed_len(&self) -> usize {
        self.state.lock().unwrap().flushed_len
    }
}

#[async_trait]
impl PacketSink for RecordingSink {
    async fn write(&mut self, msg: &Message) -> Result<(), LinkError> {
        {
            let mut state = self.state.lock().unwrap();
            state.writes += 1;
            if let Some((step, reason)) = &state.fail_write_at {
                if *step == state.writes {
                    return Err(LinkError::Io(io::Error::other(reason.clone())));
                }
            }
            state.messages.push(msg.clone());
        }
        self.log.push(match self.side {
            Side::Client => Event::ClientWrite(msg.tag()),
            Side::Server => Event::ServerWrite(msg.tag()),
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), LinkError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(reason) = &state.fail_flush {
                return Err(LinkError::Io(io::Error::other(reason.clone())));
            }
            state.flushes += 1;
            state.flushed_len = state.messages.len();
        }
        self.log.push(match self.side {
            Side::Client => Event::ClientFlush,
            Side::Server => Event::ServerFlush,
        });
        Ok(())
    }
}

/// Trace target that turns every complete line into [`Event::Trace`].
pub struct TraceCapture {
    buf: Vec<u8>,
    log: EventLog,
}

impl TraceCapture {
    pub fn new(log: &EventLog) -> Self {
        Self {
            buf: Vec::new(),
            log: log.clone(),
        }
    }
}

impl io::Write for TraceCapture {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        while let Some(end) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]).into_owned();
            self.log.push(Event::Trace(text));
        }
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// What the next [`ScriptedConnector::connect`] does.
#[derive(Debug)]
pub enum Script {
    /// Connect, queue these messages and stay up until stopped.
    Send(Vec<Message>),
    /// Connect, queue these messages, then end the reader with this error.
    SendThenDie(Vec<Message>, Option<LinkError>),
    /// Connect, then end the reader at once.
    Die(Option<LinkError>),
    /// Fail to connect.
    Refuse(String),
}

struct FakeConnection {
    name: String,
    log: EventLog,
    reader_stop: CancellationToken,
    fail_close: Option<String>,
}

#[async_trait]
impl UpstreamConnection for FakeConnection {
    async fn close(&mut self) -> Result<(), LinkError> {
        self.log.push(Event::Close(
            self.name.clone(),
            self.reader_stop.is_cancelled(),
        ));
        match &self.fail_close {
            Some(reason) => Err(LinkError::Io(io::Error::other(reason.clone()))),
            None => Ok(()),
        }
    }
}

/// [`UpstreamConnector`] that plays back [`Script`]s in order. Every link
/// writes into the same server-side [`RecordingSink`].
#[derive(Clone)]
pub struct ScriptedConnector {
    log: EventLog,
    scripts: Arc<Mutex<VecDeque<Script>>>,
    upstream: RecordingSink,
}

impl ScriptedConnector {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            scripts: Arc::default(),
            upstream: RecordingSink::upstream(log),
        }
    }

    /// Queue the behavior of the next connect.
    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Sink shared by every server-bound writer this connector hands out.
    pub fn upstream_sink(&self) -> RecordingSink {
        self.upstream.clone()
    }

    /// An idle link that was never dialed through [`UpstreamConnector`].
    pub fn fake_link(&self, name: &str) -> UpstreamLink {
        self.scripted_link(name, Script::Send(Vec::new()))
    }

    /// An idle link whose close fails with `reason`.
    pub fn fake_link_failing_close(&self, name: &str, reason: &str) -> UpstreamLink {
        self.build_link(name, Script::Send(Vec::new()), Some(reason.to_string()))
    }

    /// A link behaving as `script` describes.
    pub fn scripted_link(&self, name: &str, script: Script) -> UpstreamLink {
        self.build_link(name, script, None)
    }

    fn build_link(&self, name: &str, script: Script, fail_close: Option<String>) -> UpstreamLink {
        let (messages, ending) = match script {
            Script::Send(messages) => (messages, None),
            Script::SendThenDie(messages, err) => (messages, Some(err)),
            Script::Die(err) => (Vec::new(), Some(err)),
            Script::Refuse(reason) => panic!("refusing script has no link: {reason}"),
        };

        let (tx, incoming) = mpsc::channel(messages.len().max(1));
        for msg in messages {
            tx.try_send(msg).unwrap();
        }

        let mut reader_stop = None;
        let lifecycle = Lifecycle::spawn(|stop| {
            reader_stop = Some(stop.clone());
            async move {
                match ending {
                    Some(err) => {
                        drop(tx);
                        err.map_or(Ok(()), Err)
                    }
                    None => {
                        stop.cancelled().await;
                        drop(tx);
                        Ok(())
                    }
                }
            }
        });
        let reader_stop = reader_stop.unwrap();

        UpstreamLink {
            name: name.to_string(),
            address: format!("{name}.test:25565"),
            connection: Box::new(FakeConnection {
                name: name.to_string(),
                log: self.log.clone(),
                reader_stop,
                fail_close,
            }),
            writer: Box::new(self.upstream.clone()),
            incoming,
            lifecycle,
        }
    }
}

#[async_trait]
impl UpstreamConnector for ScriptedConnector {
    async fn connect(&self, name: &str, address: &str) -> Result<UpstreamLink, LinkError> {
        self.log
            .push(Event::Connect(name.to_string(), address.to_string()));
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            None => Err(refused(address, "no script")),
            Some(Script::Refuse(reason)) => Err(refused(address, &reason)),
            Some(script) => {
                let mut link = self.scripted_link(name, script);
                link.address = address.to_string();
                Ok(link)
            }
        }
    }
}

fn refused(address: &str, reason: &str) -> LinkError {
    LinkError::Connect {
        address: address.to_string(),
        source: io::Error::new(io::ErrorKind::ConnectionRefused, reason.to_string()),
    }
}

/// A JoinWorld into `dimension` with fixed attributes.
pub fn join_world(dimension: &str) -> JoinWorld {
    JoinWorld {
        dimension_id: dimension.to_string(),
        dimension_kind: "minecraft:overworld".to_string(),
        game_mode: 0,
        previous_game_mode: -1,
        hashed_seed: 0x5eed,
        is_debug: false,
        is_flat: false,
    }
}

/// A tab row for a fresh player called `name`.
pub fn tab_entry(name: &str) -> TabListEntry {
    TabListEntry {
        id: Uuid::new_v4(),
        name: name.to_string(),
        game_mode: 0,
        latency_ms: 35,
        display_name: None,
    }
}

/// A session writing to `sink` whose connector refuses every dial.
pub fn session_with(sink: RecordingSink) -> Session {
    let connector = ScriptedConnector::new(&sink.log);
    session_with_connector(sink, connector)
}

/// A session writing to `sink` and dialing through `connector`.
pub fn session_with_connector(sink: RecordingSink, connector: ScriptedConnector) -> Session {
    Session::new(SessionId(1), Box::new(sink), Arc::new(connector))
}
