//! Movement engine.
//!
//! Validates and executes room transitions for one session. The whole
//! lookup-validate-write sequence runs under the registry's write lock, so a
//! session racing two commands can't lose an update. Different sessions only
//! share durable occupancy counters, which the sync layer adjusts with
//! commutative increments and decrements.

use std::sync::Arc;

use crate::{
    action::SyncAction,
    registry::SessionRegistry,
    world::{Direction, Room},
};

/// Why a move failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// No session with that id is registered.
    #[error("session not found: {0}")]
    NoSuchSession(u64),

    /// The current room has no exit that way. Ordinary gameplay.
    #[error("no exit {direction} from room {room_id:?}")]
    NoExit {
        /// Room the session is in
        room_id: String,
        /// Requested direction
        direction: Direction,
    },

    /// The exit exists but its target is not in the world graph.
    ///
    /// Data-integrity fault. The session stays where it was.
    #[error("exit {direction} from room {room_id:?} leads to unknown room {target:?}")]
    DanglingExit {
        /// Room the session is in
        room_id: String,
        /// Requested direction
        direction: Direction,
        /// Unresolvable target id
        target: String,
    },
}

/// A completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// Session that moved
    pub session_id: u64,
    /// Character bound to the session
    pub character_id: String,
    /// Direction taken
    pub direction: Direction,
    /// Room left
    pub from: Arc<Room>,
    /// Room entered
    pub to: Arc<Room>,
}

impl Move {
    /// Sync action mirroring this move into durable state.
    pub fn sync_action(&self) -> SyncAction {
        SyncAction::CharacterMoved {
            character_id: self.character_id.clone(),
            from_room: self.from.id.clone(),
            to_room: self.to.id.clone(),
        }
    }
}

impl SessionRegistry {
    /// Move a session one step in `direction`.
    ///
    /// On success the session's room is replaced and the new room returned
    /// inside the [`Move`]. On failure the session is unchanged.
    pub fn move_session(&self, session_id: u64, direction: Direction) -> Result<Move, MoveError> {
        let mut sessions = self.write();

        let session = sessions.get_mut(&session_id).ok_or(MoveError::NoSuchSession(session_id))?;

        let target = session.room.exit(direction).ok_or_else(|| MoveError::NoExit {
            room_id: session.room.id.clone(),
            direction,
        })?;

        let next = self.world().room(target).cloned().ok_or_else(|| MoveError::DanglingExit {
            room_id: session.room.id.clone(),
            direction,
            target: target.to_string(),
        })?;

        let from = std::mem::replace(&mut session.room, Arc::clone(&next));

        Ok(Move {
            session_id,
            character_id: session.character_id.clone(),
            direction,
            from,
            to: next,
        })
    }
}
