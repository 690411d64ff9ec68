//! The task that owns a session.
//!
//! [`SessionExecutor::run`] multiplexes three inputs onto one [`Session`]:
//! queued commands, messages from the current upstream and messages from
//! the client. Commands win ties so that a reconnect queued behind a busy
//! upstream is not starved. Every input is handled to completion before the
//! next one is looked at, which is what makes commands serial.

use portal_net::{Message, UpstreamLink};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::error::SessionError;
use crate::session::{Session, upstream_gone};

/// Drives one session until it ends.
#[derive(Debug)]
pub struct SessionExecutor {
    session: Session,
    commands: mpsc::Receiver<Command>,
    downstream: mpsc::Receiver<Message>,
}

enum Step {
    Command(Option<Command>),
    Upstream(Result<Message, SessionError>),
    Downstream(Option<Message>),
}

impl SessionExecutor {
    /// Build an executor for `session`, reading commands from `commands` and
    /// decoded client messages from `downstream`.
    pub fn new(
        session: Session,
        commands: mpsc::Receiver<Command>,
        downstream: mpsc::Receiver<Message>,
    ) -> Self {
        Self {
            session,
            commands,
            downstream,
        }
    }

    /// Run until the first error, tear the upstream down and return that
    /// error as the reason the session ended.
    pub async fn run(mut self) -> SessionError {
        let id = self.session.id();
        let reason = self.drive().await;
        if reason.is_end_of_stream() {
            info!(session = %id, "session ended");
        } else {
            warn!(session = %id, reason = %reason, "session ended");
        }

        if let Err(e) = self.session.teardown_upstream().await {
            warn!(session = %id, error = %e, "upstream teardown failed");
        }
        reason
    }

    async fn drive(&mut self) -> SessionError {
        let mut commands_open = true;
        loop {
            let step = tokio::select! {
                biased;
                cmd = self.commands.recv(), if commands_open => Step::Command(cmd),
                msg = next_upstream(self.session.upstream.as_mut()) => Step::Upstream(msg),
                msg = self.downstream.recv() => Step::Downstream(msg),
            };

            let outcome = match step {
                Step::Command(None) => {
                    debug!(session = %self.session.id(), "command queue closed");
                    commands_open = false;
                    Ok(())
                }
                Step::Command(Some(cmd)) => {
                    debug!(session = %self.session.id(), command = cmd.name(), "running command");
                    cmd.execute(&mut self.session).await
                }
                Step::Upstream(Ok(msg)) => self.session.forward_to_client(msg).await,
                Step::Upstream(Err(e)) => Err(e),
                Step::Downstream(Some(msg)) => self.session.forward_to_server(msg).await,
                Step::Downstream(None) => Err(SessionError::DownstreamClosed),
            };

            if let Err(e) = outcome {
                return e;
            }
        }
    }
}

/// Next message from the upstream. Never resolves without one.
async fn next_upstream(link: Option<&mut UpstreamLink>) -> Result<Message, SessionError> {
    let Some(link) = link else {
        return std::future::pending().await;
    };
    match link.incoming.recv().await {
        Some(msg) => Ok(msg),
        None => Err(upstream_gone(link).await),
    }
}
