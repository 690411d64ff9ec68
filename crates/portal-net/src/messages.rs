//! Protocol message types and serialization.
//!
//! All messages are serialized with [`postcard`] and prefixed with a protocol
//! version byte. Use [`serialize_message`] and [`deserialize_message`] for
//! encoding/decoding. Only the messages the proxy itself composes or inspects
//! have typed payloads; everything else travels as [`Raw`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

/// Dimension identifier of the primary (overworld) dimension.
pub const PRIMARY_DIMENSION: &str = "minecraft:overworld";

/// Dimension the client is bounced through when the target world is the
/// primary one. Clients fully discard cached world state when entering it.
pub const ALTERNATE_DIMENSION: &str = "minecraft:the_end";

/// [`GameStateChange::reason`] code announcing a game mode change.
pub const GAME_MODE_CHANGED: u8 = 3;

/// Which way a message travels through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Client to backend server.
    ServerBound,
    /// Backend server to client.
    ClientBound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ServerBound => f.write_str("server-bound"),
            Direction::ClientBound => f.write_str("client-bound"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level enum
// ---------------------------------------------------------------------------

/// Top-level protocol message. The enum discriminant is the type tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    // --- World ---
    /// Server places the client into a world.
    JoinWorld(JoinWorld),
    /// Server moves the client to another dimension.
    Respawn(Respawn),
    /// Server announces a game state change (e.g. game mode).
    GameStateChange(GameStateChange),

    // --- Tab list ---
    /// Server adds or replaces tab-list rows.
    TabListAdd(TabListAdd),
    /// Server removes tab-list rows.
    TabListRemove(TabListRemove),
    /// Server sets the tab-list header and footer.
    TabListTitle(TabListTitle),

    // --- Connection ---
    /// Server disconnects the client with a reason.
    Kick(Kick),
    /// Chat line in either direction.
    Chat(Chat),
    /// Liveness probe in either direction.
    KeepAlive(KeepAlive),

    /// Any message the proxy forwards without interpreting it.
    Raw(Raw),
}

/// Unique tag identifying a message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    /// [`JoinWorld`].
    JoinWorld,
    /// [`Respawn`].
    Respawn,
    /// [`GameStateChange`].
    GameStateChange,
    /// [`TabListAdd`].
    TabListAdd,
    /// [`TabListRemove`].
    TabListRemove,
    /// [`TabListTitle`].
    TabListTitle,
    /// [`Kick`].
    Kick,
    /// [`Chat`].
    Chat,
    /// [`KeepAlive`].
    KeepAlive,
    /// [`Raw`].
    Raw,
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Message {
    /// Extract the tag from a message without consuming it.
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::JoinWorld(_) => MessageTag::JoinWorld,
            Message::Respawn(_) => MessageTag::Respawn,
            Message::GameStateChange(_) => MessageTag::GameStateChange,
            Message::TabListAdd(_) => MessageTag::TabListAdd,
            Message::TabListRemove(_) => MessageTag::TabListRemove,
            Message::TabListTitle(_) => MessageTag::TabListTitle,
            Message::Kick(_) => MessageTag::Kick,
            Message::Chat(_) => MessageTag::Chat,
            Message::KeepAlive(_) => MessageTag::KeepAlive,
            Message::Raw(_) => MessageTag::Raw,
        }
    }

    /// Build a client-bound kick carrying `reason` as plain chat text.
    pub fn kick(reason: &str) -> Self {
        Message::Kick(Kick {
            text: chat_text(reason),
        })
    }
}

/// Wrap plain text in the JSON chat component form, `{"text":"..."}`.
pub fn chat_text(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Join-world handshake sent by a server right after a client connects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinWorld {
    /// Dimension identifier, e.g. `minecraft:overworld`.
    pub dimension_id: String,
    /// Dimension type descriptor.
    pub dimension_kind: String,
    /// Current game mode.
    pub game_mode: u8,
    /// Previous game mode, `-1` if none.
    pub previous_game_mode: i8,
    /// First 8 bytes of the SHA-256 of the world seed.
    pub hashed_seed: i64,
    /// Debug world flag.
    pub is_debug: bool,
    /// Superflat world flag.
    pub is_flat: bool,
}

/// Dimension change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Respawn {
    /// Dimension identifier.
    pub dimension_id: String,
    /// Dimension type descriptor.
    pub dimension_kind: String,
    /// Game mode after the respawn.
    pub game_mode: u8,
    /// Previous game mode, `-1` if none.
    pub previous_game_mode: i8,
    /// Hashed world seed.
    pub hashed_seed: i64,
    /// Debug world flag.
    pub is_debug: bool,
    /// Superflat world flag.
    pub is_flat: bool,
    /// Keep carried-over player attributes instead of resetting them.
    pub preserve_metadata: bool,
}

impl Respawn {
    /// A respawn into the world described by `join`, dropping metadata.
    pub fn from_join(join: &JoinWorld) -> Self {
        Self {
            dimension_id: join.dimension_id.clone(),
            dimension_kind: join.dimension_kind.clone(),
            game_mode: join.game_mode,
            previous_game_mode: join.previous_game_mode,
            hashed_seed: join.hashed_seed,
            is_debug: join.is_debug,
            is_flat: join.is_flat,
            preserve_metadata: false,
        }
    }
}

/// Game state change notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStateChange {
    /// Reason code, see [`GAME_MODE_CHANGED`].
    pub reason: u8,
    /// Reason-specific value.
    pub value: f32,
}

/// One row of the client's tab list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabListEntry {
    /// Player identity.
    pub id: Uuid,
    /// Player name.
    pub name: String,
    /// Player game mode.
    pub game_mode: u8,
    /// Round-trip latency shown next to the name.
    pub latency_ms: u32,
    /// Optional JSON display name overriding `name`.
    pub display_name: Option<String>,
}

/// Adds (or replaces) tab-list rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabListAdd {
    /// Rows to add.
    pub entries: Vec<TabListEntry>,
}

/// Removes tab-list rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabListRemove {
    /// Rows to remove.
    pub entries: Vec<TabListEntry>,
}

/// Tab-list header and footer, both JSON chat components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabListTitle {
    /// Header above the player rows.
    pub header: String,
    /// Footer below the player rows.
    pub footer: String,
}

/// Disconnect with a reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Kick {
    /// JSON chat component.
    pub text: String,
}

/// Chat line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    /// Message text.
    pub text: String,
}

/// Keepalive probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeepAlive {
    /// Probe identifier echoed by the peer.
    pub id: i64,
}

/// Uninterpreted message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Raw {
    /// Packet identifier.
    pub id: u32,
    /// Packet body.
    pub data: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard encoding or decoding failed.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a [`Message`] into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded Message]`
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>, MessageError> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload into a [`Message`].
pub fn deserialize_message(data: &[u8]) -> Result<Message, MessageError> {
    let (&version, body) = data.split_first().ok_or(MessageError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overworld_join() -> JoinWorld {
        JoinWorld {
            dimension_id: PRIMARY_DIMENSION.to_string(),
            dimension_kind: "minecraft:overworld".to_string(),
            game_mode: 1,
            previous_game_mode: -1,
            hashed_seed: 0x5eed,
            is_debug: false,
            is_flat: true,
        }
    }

    #[test]
    fn test_join_world_roundtrip() {
        let msg = Message::JoinWorld(overworld_join());
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_tab_list_entries_survive_roundtrip() {
        let msg = Message::TabListAdd(TabListAdd {
            entries: vec![TabListEntry {
                id: Uuid::new_v4(),
                name: "Alice".to_string(),
                game_mode: 0,
                latency_ms: 42,
                display_name: Some(chat_text("Alice the Great")),
            }],
        });
        let bytes = serialize_message(&msg).unwrap();
        assert_eq!(deserialize_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_respawn_from_join_copies_every_attribute() {
        let join = overworld_join();
        let respawn = Respawn::from_join(&join);
        assert_eq!(respawn.dimension_id, join.dimension_id);
        assert_eq!(respawn.dimension_kind, join.dimension_kind);
        assert_eq!(respawn.game_mode, join.game_mode);
        assert_eq!(respawn.previous_game_mode, join.previous_game_mode);
        assert_eq!(respawn.hashed_seed, join.hashed_seed);
        assert_eq!(respawn.is_debug, join.is_debug);
        assert_eq!(respawn.is_flat, join.is_flat);
        assert!(!respawn.preserve_metadata);
    }

    #[test]
    fn test_chat_text_is_json_component() {
        assert_eq!(chat_text(""), r#"{"text":""}"#);
        assert_eq!(chat_text(r#"say "hi""#), r#"{"text":"say \"hi\""}"#);
    }

    #[test]
    fn test_kick_wraps_reason() {
        let Message::Kick(kick) = Message::kick("server full") else {
            panic!("expected a kick");
        };
        assert_eq!(kick.text, r#"{"text":"server full"}"#);
    }

    #[test]
    fn test_tag_names_the_variant() {
        let msg = Message::KeepAlive(KeepAlive { id: 7 });
        assert_eq!(msg.tag(), MessageTag::KeepAlive);
        assert_eq!(msg.tag().to_string(), "KeepAlive");
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::ServerBound.to_string(), "server-bound");
        assert_eq!(Direction::ClientBound.to_string(), "client-bound");
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = serialize_message(&Message::KeepAlive(KeepAlive { id: 0 })).unwrap();
        bytes[0] = 255;
        assert!(matches!(
            deserialize_message(&bytes),
            Err(MessageError::UnsupportedVersion(255))
        ));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            deserialize_message(&[]),
            Err(MessageError::EmptyPayload)
        ));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        assert!(deserialize_message(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]).is_err());
    }
}
