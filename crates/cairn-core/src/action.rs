//! Durable-state side effects produced by game logic.
//!
//! Core logic never touches storage. Instead it returns [`SyncAction`]s that
//! the runtime hands to the state synchronizer after the player has already
//! been answered. Actions are applied at most once and in submission order;
//! a failed action is logged and dropped.

/// A change to mirror into durable room/character state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// A session entered the world in `room_id`.
    SessionStarted {
        /// Character bound to the session
        character_id: String,
        /// Room the session was placed in
        room_id: String,
    },

    /// A session moved between rooms.
    CharacterMoved {
        /// Character bound to the session
        character_id: String,
        /// Room left
        from_room: String,
        /// Room entered
        to_room: String,
    },

    /// A session left the world while in `room_id`.
    SessionEnded {
        /// Character bound to the session
        character_id: String,
        /// Room the session was in when it ended
        room_id: String,
    },
}

impl SyncAction {
    /// Character the action concerns.
    pub fn character_id(&self) -> &str {
        match self {
            Self::SessionStarted { character_id, .. }
            | Self::CharacterMoved { character_id, .. }
            | Self::SessionEnded { character_id, .. } => character_id,
        }
    }
}
