//! Storage abstraction for durable world state.
//!
//! Trait-based abstraction for persisting users, character templates and the
//! two mirrored state tables (`CharacterState`, `RoomState`). The trait is
//! synchronous (no async); the runtime calls it from `spawn_blocking`.
//!
//! Every method is individually atomic. Nothing assumes transactions spanning
//! several calls.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use serde::{Deserialize, Serialize};

pub use self::redb::RedbStorage;

/// Status tag given to freshly initialized characters.
pub const STATUS_ACTIVE: &str = "active";

/// Health given to characters with no template health.
pub const DEFAULT_HEALTH: i32 = 100;

/// Login credentials bound to one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Random user id
    pub id: u64,
    /// Unique login name (the storage key)
    pub username: String,
    /// Character the user plays
    pub character_id: String,
    /// Last known room id
    pub room_id: String,
    /// Hex-encoded random salt
    pub salt: String,
    /// Hex-encoded HMAC-SHA256(salt, password)
    pub digest: String,
}

/// A character template known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Character id
    pub id: String,
    /// Display name
    pub name: String,
    /// Starting health
    pub health: i32,
}

/// Durable mirror of a character's location, health and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// Character id (the storage key)
    pub character_id: String,
    /// Current room id
    pub room_id: String,
    /// Current health
    pub health: i32,
    /// Status tag, `"active"` on creation
    pub status: String,
    /// Unix seconds of the last change
    pub updated_at: u64,
}

impl CharacterState {
    /// Fresh `"active"` state.
    pub fn new(
        character_id: impl Into<String>,
        room_id: impl Into<String>,
        health: i32,
        now: u64,
    ) -> Self {
        Self {
            character_id: character_id.into(),
            room_id: room_id.into(),
            health,
            status: STATUS_ACTIVE.to_string(),
            updated_at: now,
        }
    }

    /// Apply a single-field update and bump `updated_at`.
    pub fn apply(&mut self, update: &CharacterUpdate, now: u64) {
        match update {
            CharacterUpdate::Room(room_id) => self.room_id.clone_from(room_id),
            CharacterUpdate::Health(health) => self.health = *health,
            CharacterUpdate::Status(status) => self.status.clone_from(status),
        }
        self.updated_at = now;
    }
}

/// One field of [`CharacterState`] to change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterUpdate {
    /// New current room
    Room(String),
    /// New health value
    Health(i32),
    /// New status tag
    Status(String),
}

/// Persisted state of one NPC in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcState {
    /// NPC id
    pub id: String,
    /// Current health
    pub health: i32,
}

/// Persisted state of one item stack in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    /// Item id
    pub id: String,
    /// Stack size
    pub quantity: u32,
}

/// Durable per-room state.
///
/// `occupants` is unsigned; decrementing at zero is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    /// Room id (the storage key)
    pub room_id: String,
    /// Sessions believed to be in the room
    pub occupants: u32,
    /// NPCs present
    pub npcs: Vec<NpcState>,
    /// Items on the floor
    pub items: Vec<ItemState>,
    /// Unix seconds of the last change
    pub updated_at: u64,
}

impl RoomState {
    /// Empty state with zero occupants.
    pub fn new(room_id: impl Into<String>, now: u64) -> Self {
        Self {
            room_id: room_id.into(),
            occupants: 0,
            npcs: Vec::new(),
            items: Vec::new(),
            updated_at: now,
        }
    }

    /// Adjust the counter by one, clamped at zero.
    pub fn adjust(&mut self, delta: Occupancy, now: u64) {
        self.occupants = match delta {
            Occupancy::Increment => self.occupants.saturating_add(1),
            Occupancy::Decrement => self.occupants.saturating_sub(1),
        };
        self.updated_at = now;
    }

    /// Replace one field and bump `updated_at`.
    pub fn apply(&mut self, update: &RoomUpdate, now: u64) {
        match update {
            RoomUpdate::Occupants(count) => self.occupants = *count,
            RoomUpdate::Npcs(npcs) => self.npcs.clone_from(npcs),
            RoomUpdate::Items(items) => self.items.clone_from(items),
        }
        self.updated_at = now;
    }
}

/// One field of [`RoomState`] to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomUpdate {
    /// Absolute occupant count
    Occupants(u32),
    /// Full NPC list
    Npcs(Vec<NpcState>),
    /// Full item list
    Items(Vec<ItemState>),
}

/// Direction of an occupancy adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// +1; creates the row (at 1) if absent
    Increment,
    /// -1; no-op on an absent or zero row
    Decrement,
}

/// Storage abstraction for users, characters and mirrored state.
///
/// Must be Clone (shared by the authenticator and the sync worker), Send +
/// Sync (thread-safe), and synchronous. Implementations share internal state
/// via Arc, so clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Insert or replace a user, keyed by username.
    fn put_user(&self, user: &UserRecord) -> Result<(), StorageError>;

    /// Load a user by username. `None` if unknown.
    fn load_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// All users. Order is not guaranteed.
    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    /// Insert or replace a character template.
    fn put_character(&self, character: &CharacterRecord) -> Result<(), StorageError>;

    /// Load a character template. `None` if unknown.
    fn load_character(&self, id: &str) -> Result<Option<CharacterRecord>, StorageError>;

    /// All character templates. Order is not guaranteed.
    fn list_characters(&self) -> Result<Vec<CharacterRecord>, StorageError>;

    /// Insert `state` unless a row for its character already exists.
    ///
    /// Returns `true` if a row was created. An existing row is left as is.
    fn create_character_state(&self, state: &CharacterState) -> Result<bool, StorageError>;

    /// Load a character's state. `None` if absent.
    fn load_character_state(&self, id: &str) -> Result<Option<CharacterState>, StorageError>;

    /// Apply `update` to an existing row and return the new state.
    ///
    /// Fails with [`StorageError::NotFound`] if there is no row.
    fn update_character_state(
        &self,
        id: &str,
        update: &CharacterUpdate,
        now: u64,
    ) -> Result<CharacterState, StorageError>;

    /// Delete a character's state. Returns whether a row existed.
    ///
    /// Administrative only; gameplay never deletes state.
    fn delete_character_state(&self, id: &str) -> Result<bool, StorageError>;

    /// All character state rows. Order is not guaranteed.
    fn list_character_states(&self) -> Result<Vec<CharacterState>, StorageError>;

    /// Character state rows whose current room is `room_id`.
    fn list_characters_in_room(&self, room_id: &str) -> Result<Vec<CharacterState>, StorageError>;

    /// Insert `state` unless a row for its room already exists.
    ///
    /// Returns `true` if a row was created.
    fn create_room_state(&self, state: &RoomState) -> Result<bool, StorageError>;

    /// Load a room's state. `None` if absent.
    fn load_room_state(&self, room_id: &str) -> Result<Option<RoomState>, StorageError>;

    /// Atomically adjust a room's occupant counter and return the new value.
    ///
    /// # Invariants
    ///
    /// - Increment on an absent row creates it with one occupant
    /// - Decrement on an absent row returns 0 and creates nothing
    /// - Decrement at zero leaves the counter at zero
    fn adjust_occupancy(
        &self,
        room_id: &str,
        delta: Occupancy,
        now: u64,
    ) -> Result<u32, StorageError>;

    /// Replace one field of an existing room row and return the new state.
    ///
    /// Fails with [`StorageError::NotFound`] if there is no row.
    fn update_room_state(
        &self,
        room_id: &str,
        update: &RoomUpdate,
        now: u64,
    ) -> Result<RoomState, StorageError>;

    /// All room state rows. Order is not guaranteed.
    fn list_room_states(&self) -> Result<Vec<RoomState>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_clamps_at_zero() {
        let mut state = RoomState::new("start", 0);
        state.adjust(Occupancy::Decrement, 1);
        assert_eq!(state.occupants, 0);

        state.adjust(Occupancy::Increment, 2);
        state.adjust(Occupancy::Increment, 3);
        state.adjust(Occupancy::Decrement, 4);
        assert_eq!(state.occupants, 1);
        assert_eq!(state.updated_at, 4);
    }

    #[test]
    fn room_update_replaces_one_field() {
        let mut state = RoomState::new("start", 0);
        state.adjust(Occupancy::Increment, 1);

        let goblin = NpcState { id: "goblin".to_string(), health: 12 };
        state.apply(&RoomUpdate::Npcs(vec![goblin.clone()]), 2);
        assert_eq!(state.npcs, vec![goblin]);
        assert_eq!(state.occupants, 1);
        assert!(state.items.is_empty());

        state.apply(&RoomUpdate::Occupants(0), 3);
        assert_eq!(state.occupants, 0);
        assert_eq!(state.npcs.len(), 1);
        assert_eq!(state.updated_at, 3);
    }

    #[test]
    fn character_update_touches_one_field() {
        let mut state = CharacterState::new("hero", "start", DEFAULT_HEALTH, 10);

        state.apply(&CharacterUpdate::Room("up_room".to_string()), 11);
        assert_eq!(state.room_id, "up_room");
        assert_eq!(state.health, DEFAULT_HEALTH);
        assert_eq!(state.status, STATUS_ACTIVE);
        assert_eq!(state.updated_at, 11);

        state.apply(&CharacterUpdate::Health(42), 12);
        state.apply(&CharacterUpdate::Status("resting".to_string()), 13);
        assert_eq!(state.room_id, "up_room");
        assert_eq!(state.health, 42);
        assert_eq!(state.status, "resting");
    }
}
