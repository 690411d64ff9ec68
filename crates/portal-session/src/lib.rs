//! Session core of the proxy.
//!
//! A [`Session`] ties one client connection to at most one backend
//! connection. Everything that changes a session from the outside goes
//! through a [`Command`], and a [`SessionExecutor`] runs those commands one
//! at a time alongside normal message forwarding.
//!
//! The two commands are [`Reconnect`], which moves the client to another
//! backend and replays a dimension switch so the client drops its cached
//! world, and [`InjectPacket`], which writes pre-built messages to either
//! side.

pub mod command;
pub mod dimension;
pub mod error;
pub mod executor;
pub mod hooks;
pub mod inject;
pub mod reconnect;
pub mod session;
pub mod tab_list;
pub mod trace;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{Command, CommandHandle, SessionGone, command_channel};
pub use dimension::send_dimension_switch;
pub use error::{HookError, SessionError};
pub use executor::SessionExecutor;
pub use hooks::{PacketHook, PacketHooks};
pub use inject::InjectPacket;
pub use reconnect::Reconnect;
pub use session::{DEFAULT_EOF_LINGER, Session, SessionId, SessionSettings};
pub use tab_list::TabList;
pub use trace::TraceSink;
