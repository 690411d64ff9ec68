//! Out-of-band operations on a live session.
//!
//! Anything outside the session task (the console, an admin endpoint, a
//! plugin) changes a session by sending it a [`Command`] through its
//! [`CommandHandle`]. The session's executor runs commands one at a time, in
//! the order they were sent, and never interleaves one with another.

use portal_net::{Direction, Message};
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::inject::InjectPacket;
use crate::reconnect::Reconnect;
use crate::session::Session;

/// A single operation run against a session.
#[derive(Debug)]
pub enum Command {
    /// Move the client to another backend server.
    Reconnect(Reconnect),
    /// Write pre-built messages toward one side.
    InjectPacket(InjectPacket),
}

impl Command {
    /// Reconnect to server `name` at `address`.
    pub fn reconnect(name: impl Into<String>, address: impl Into<String>) -> Self {
        Command::Reconnect(Reconnect::new(name, address))
    }

    /// Deliver `payload` toward `direction`.
    ///
    /// # Panics
    ///
    /// Panics if `payload` is empty.
    pub fn inject(direction: Direction, payload: Vec<Message>) -> Self {
        Command::InjectPacket(InjectPacket::new(direction, payload))
    }

    /// Deliver `payload` toward `direction`, then fail with `raise`.
    ///
    /// # Panics
    ///
    /// Panics if `payload` is empty.
    pub fn inject_then(direction: Direction, payload: Vec<Message>, raise: SessionError) -> Self {
        Command::InjectPacket(InjectPacket::new(direction, payload).then_raise(raise))
    }

    /// Show `reason` to the client and end the session gracefully.
    pub fn kick(reason: &str) -> Self {
        Self::inject_then(
            Direction::ClientBound,
            vec![Message::kick(reason)],
            SessionError::EndOfStream,
        )
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reconnect(_) => "reconnect",
            Command::InjectPacket(_) => "inject",
        }
    }

    /// Run the command against `session`.
    pub async fn execute(self, session: &mut Session) -> Result<(), SessionError> {
        match self {
            Command::Reconnect(cmd) => cmd.execute(session).await,
            Command::InjectPacket(cmd) => cmd.execute(session).await,
        }
    }
}

impl From<Reconnect> for Command {
    fn from(cmd: Reconnect) -> Self {
        Command::Reconnect(cmd)
    }
}

impl From<InjectPacket> for Command {
    fn from(cmd: InjectPacket) -> Self {
        Command::InjectPacket(cmd)
    }
}

/// Error returned when the session a command was sent to has ended.
#[derive(Debug, thiserror::Error)]
#[error("session has ended")]
pub struct SessionGone(pub Command);

/// Sending side of a session's command queue.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<Command>,
}

impl CommandHandle {
    /// Queue `cmd` behind every command sent before it.
    pub async fn send(&self, cmd: impl Into<Command>) -> Result<(), SessionGone> {
        self.tx
            .send(cmd.into())
            .await
            .map_err(|mpsc::error::SendError(cmd)| SessionGone(cmd))
    }

    /// Whether the session has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a command queue holding up to `capacity` pending commands.
pub fn command_channel(capacity: usize) -> (CommandHandle, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandHandle { tx }, rx)
}
