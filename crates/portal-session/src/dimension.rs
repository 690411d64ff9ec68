//! Client-side world switch without dropping the client's socket.
//!
//! The client caches per-world state (chunks, entities, tab rows, the
//! scoreboard) that it only throws away when it believes it changed
//! dimension. The burst written here walks it through two respawns around
//! the real [`JoinWorld`] so that it reinitialises from scratch:
//!
//! ```text
//! [TabListRemove]  only if rows are cached
//!  TabListTitle    empty header and footer
//!  Respawn         join attributes, dimension toggled away from the target
//!  JoinWorld       as received from the new upstream
//!  Respawn         join attributes, true dimension
//!  GameStateChange game mode
//!  flush
//! ```
//!
//! Every step is written unflushed and the burst is flushed once. The first
//! failure is returned as is; already-written steps are not rolled back.

use portal_net::messages::{GameStateChange, TabListRemove, TabListTitle, chat_text};
use portal_net::{
    ALTERNATE_DIMENSION, GAME_MODE_CHANGED, JoinWorld, Message, PRIMARY_DIMENSION, Respawn,
};

use crate::error::SessionError;
use crate::session::Session;

/// Write the dimension-switch burst for `join` to the client.
pub async fn send_dimension_switch(
    session: &mut Session,
    join: &JoinWorld,
) -> Result<(), SessionError> {
    let w = &mut session.downstream;

    if !session.tab_list.is_empty() {
        let entries = session.tab_list.entries();
        w.write(&Message::TabListRemove(TabListRemove { entries }))
            .await?;
        session.tab_list.clear();
    }

    w.write(&Message::TabListTitle(TabListTitle {
        header: chat_text(""),
        footer: chat_text(""),
    }))
    .await?;

    w.write(&Message::Respawn(detour_respawn(join))).await?;
    w.write(&Message::JoinWorld(join.clone())).await?;
    w.write(&Message::Respawn(Respawn::from_join(join))).await?;

    w.write(&Message::GameStateChange(GameStateChange {
        reason: GAME_MODE_CHANGED,
        value: f32::from(join.game_mode),
    }))
    .await?;

    w.flush().await?;
    Ok(())
}

/// The first respawn: same world attributes, but a dimension the client is
/// guaranteed not to be in right now.
fn detour_respawn(join: &JoinWorld) -> Respawn {
    let mut respawn = Respawn::from_join(join);
    if join.dimension_id == PRIMARY_DIMENSION {
        respawn.dimension_id = ALTERNATE_DIMENSION.to_string();
    }
    respawn
}
