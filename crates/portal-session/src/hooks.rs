//! Packet hooks: observers that see selected messages on their way through
//! the proxy.
//!
//! The [`PacketHooks`] registry maps [`MessageTag`] values to the hooks
//! interested in them. Hooks run in registration order and the first failure
//! stops dispatch. Typical observers track scoreboard or world context; they
//! must not write to either peer.

use std::collections::HashMap;

use portal_net::{Message, MessageTag};

use crate::error::HookError;

/// Observer for one or more message types.
pub trait PacketHook: Send + Sync {
    /// Inspect a message.
    fn on_packet(&self, msg: &Message) -> Result<(), HookError>;
}

impl<F> PacketHook for F
where
    F: Fn(&Message) -> Result<(), HookError> + Send + Sync,
{
    fn on_packet(&self, msg: &Message) -> Result<(), HookError> {
        self(msg)
    }
}

/// Registry of packet hooks keyed by [`MessageTag`].
#[derive(Default)]
pub struct PacketHooks {
    hooks: HashMap<MessageTag, Vec<Box<dyn PacketHook>>>,
}

impl PacketHooks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `hook` for messages tagged `tag`.
    pub fn register<H: PacketHook + 'static>(&mut self, tag: MessageTag, hook: H) {
        self.hooks.entry(tag).or_default().push(Box::new(hook));
    }

    /// Run every hook registered for `msg`'s tag.
    pub fn dispatch(&self, msg: &Message) -> Result<(), HookError> {
        let Some(hooks) = self.hooks.get(&msg.tag()) else {
            return Ok(());
        };
        hooks.iter().try_for_each(|hook| hook.on_packet(msg))
    }

    /// Number of hooks registered for `tag`.
    pub fn count(&self, tag: MessageTag) -> usize {
        self.hooks.get(&tag).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for PacketHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.hooks.keys().collect();
        tags.sort_by_key(|tag| tag.to_string());
        f.debug_struct("PacketHooks").field("tags", &tags).finish()
    }
}
