//! Session error types.

use std::sync::Arc;

use portal_net::{LinkError, MessageTag};

/// Why a command, or the session as a whole, ended in failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Establishing a new upstream failed. The client has already been
    /// kicked with the failure text.
    #[error("connect to upstream {name} ({address}) failed: {source}")]
    Connect {
        /// Target server name.
        name: String,
        /// Target server address.
        address: String,
        /// Why the connector failed.
        #[source]
        source: LinkError,
    },

    /// Closing the previous upstream during teardown failed.
    #[error("closing upstream failed: {0}")]
    Close(#[source] LinkError),

    /// The upstream reader died; this is the error it recorded.
    #[error(transparent)]
    Upstream(Arc<LinkError>),

    /// The upstream reader ended without recording an error.
    #[error("upstream stopped without an error")]
    UpstreamStopped,

    /// A new upstream sent something other than JoinWorld first.
    #[error("packet other than JoinWorld while reconnecting upstream: {tag}")]
    UnexpectedHandshake {
        /// What was received instead.
        tag: MessageTag,
    },

    /// A packet hook rejected a message.
    #[error("packet hook failed: {0}")]
    Hook(#[source] HookError),

    /// Writing or flushing toward either peer failed.
    #[error(transparent)]
    Write(#[from] LinkError),

    /// A server-bound write was requested with no upstream attached.
    #[error("no upstream connected")]
    NoUpstream,

    /// Requested termination after the client was told why.
    #[error("end of stream")]
    EndOfStream,

    /// The client went away.
    #[error("client disconnected")]
    DownstreamClosed,
}

impl SessionError {
    /// Whether this error asks for a graceful end of the session.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SessionError::EndOfStream)
    }
}

/// Failure reported by a packet hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{hook}: {reason}")]
pub struct HookError {
    /// Name of the failing hook.
    pub hook: String,
    /// What went wrong.
    pub reason: String,
}

impl HookError {
    /// Build a hook error.
    pub fn new(hook: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            reason: reason.into(),
        }
    }
}
