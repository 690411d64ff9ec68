//! Operator console on stdin.
//!
//! ```text
//! send <session> <server>   move a client to another server
//! kick <session> <reason>   disconnect a client with a message
//! list                      show connected clients
//! ```

use std::sync::Arc;

use portal_config::Config;
use portal_session::{Command, SessionId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::listener::SessionRegistry;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Reconnect `session` to the server called `server`.
    Send { session: SessionId, server: String },
    /// Kick `session` with `reason`.
    Kick { session: SessionId, reason: String },
    /// List sessions.
    List,
}

/// Why a console line could not be run.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("invalid session id {0:?}")]
    BadSessionId(String),
    #[error("no server named {0:?}")]
    UnknownServer(String),
    #[error("no session {0}")]
    UnknownSession(SessionId),
}

/// Parse one console line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb {
        "send" => {
            let (session, rest) = split_word(rest).ok_or(ConsoleError::MissingArgument("session"))?;
            let (server, _) = split_word(rest).ok_or(ConsoleError::MissingArgument("server"))?;
            ConsoleCommand::Send {
                session: parse_session(session)?,
                server: server.to_string(),
            }
        }
        "kick" => {
            let (session, reason) =
                split_word(rest).ok_or(ConsoleError::MissingArgument("session"))?;
            if reason.is_empty() {
                return Err(ConsoleError::MissingArgument("reason"));
            }
            ConsoleCommand::Kick {
                session: parse_session(session)?,
                reason: reason.to_string(),
            }
        }
        "list" => ConsoleCommand::List,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// First whitespace-separated word and the trimmed remainder.
fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((s, "")),
    }
}

/// Accepts `3` and `#3`.
fn parse_session(s: &str) -> Result<SessionId, ConsoleError> {
    s.trim_start_matches('#')
        .parse()
        .map(SessionId)
        .map_err(|_| ConsoleError::BadSessionId(s.to_string()))
}

/// Run `command` and describe the outcome.
pub async fn execute(
    command: ConsoleCommand,
    config: &Config,
    sessions: &SessionRegistry,
) -> Result<String, ConsoleError> {
    match command {
        ConsoleCommand::Send { session, server } => {
            let entry = config
                .server(&server)
                .ok_or_else(|| ConsoleError::UnknownServer(server.clone()))?;
            let handle = sessions
                .get(&session)
                .await
                .ok_or(ConsoleError::UnknownSession(session))?;
            handle
                .send(Command::reconnect(&entry.name, &entry.address))
                .await
                .map_err(|_| ConsoleError::UnknownSession(session))?;
            Ok(format!("sending {session} to {server}"))
        }
        ConsoleCommand::Kick { session, reason } => {
            let handle = sessions
                .get(&session)
                .await
                .ok_or(ConsoleError::UnknownSession(session))?;
            handle
                .send(Command::kick(&reason))
                .await
                .map_err(|_| ConsoleError::UnknownSession(session))?;
            Ok(format!("kicking {session}"))
        }
        ConsoleCommand::List => {
            let live = sessions.list().await;
            let mut out = format!("{} session(s)", live.len());
            for (id, peer) in live {
                out.push_str(&format!("\n  {id} {peer}"));
            }
            Ok(out)
        }
    }
}

/// Read commands from `input` until it ends.
pub async fn run<R: AsyncBufRead + Unpin>(
    input: R,
    config: Arc<Config>,
    sessions: Arc<SessionRegistry>,
) {
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "console read failed");
                break;
            }
        };
        let outcome = match parse(&line) {
            Ok(Some(command)) => execute(command, &config, &sessions).await,
            Ok(None) => continue,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(reply) => info!("{reply}"),
            Err(e) => warn!("{e}"),
        }
    }
}
