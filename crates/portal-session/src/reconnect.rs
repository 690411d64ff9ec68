//! Moving a live client to another backend server.

use portal_net::{JoinWorld, Message, UpstreamLink};
use tracing::{debug, error, info};

use crate::dimension::send_dimension_switch;
use crate::error::SessionError;
use crate::session::{Session, upstream_gone};

/// Replace the session's upstream with a fresh connection to `address` and
/// make the client believe it changed worlds.
///
/// Steps, each of which ends the command on failure:
/// 1. stop, close and drop the current upstream;
/// 2. dial the new server, kicking the client if that fails;
/// 3. take the new server's first message, which must be [`JoinWorld`];
/// 4. run the JoinWorld hooks;
/// 5. write the dimension-switch burst to the client.
///
/// The JoinWorld is consumed here and never forwarded on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconnect {
    /// Target server name, for logs and the connector.
    pub name: String,
    /// Target server address.
    pub address: String,
}

impl Reconnect {
    /// Reconnect to server `name` at `address`.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Run the reconnect against `session`.
    pub async fn execute(self, session: &mut Session) -> Result<(), SessionError> {
        session.teardown_upstream().await?;

        let link = match session.connector.connect(&self.name, &self.address).await {
            Ok(link) => link,
            Err(source) => {
                error!(
                    session = %session.id(),
                    server = %self.name,
                    address = %self.address,
                    error = %source,
                    "connect to upstream failed"
                );
                session.kick(&source.to_string()).await;
                return Err(SessionError::Connect {
                    name: self.name,
                    address: self.address,
                    source,
                });
            }
        };
        info!(
            session = %session.id(),
            server = %self.name,
            address = %self.address,
            "upstream connected"
        );

        let join = first_join(session.upstream.insert(link)).await?;
        debug!(session = %session.id(), ?join, "reconnect join");

        session
            .hooks
            .dispatch(&Message::JoinWorld(join.clone()))
            .map_err(SessionError::Hook)?;

        send_dimension_switch(session, &join).await
    }
}

/// Wait for the first client-bound message of a fresh link, or for its
/// reader to die, whichever comes first.
async fn first_join(link: &mut UpstreamLink) -> Result<JoinWorld, SessionError> {
    let first = tokio::select! {
        biased;
        msg = link.incoming.recv() => msg,
        () = link.lifecycle.dead() => None,
    };

    match first {
        Some(Message::JoinWorld(join)) => Ok(join),
        Some(other) => Err(SessionError::UnexpectedHandshake { tag: other.tag() }),
        None => Err(upstream_gone(link).await),
    }
}
