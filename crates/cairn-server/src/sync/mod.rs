//! Global state synchronizer.
//!
//! Mirrors live session state into the durable `RoomState` and
//! `CharacterState` tables. Gameplay never waits on it: the connection task
//! answers the player first, then queues [`SyncAction`]s on the background
//! worker (see [`worker`]). A failed sync is logged and dropped; the next
//! successful action re-establishes consistency.
//!
//! # Invariants
//!
//! - Initialization is insert-if-absent, so [`StateSynchronizer::bootstrap`]
//!   can run on every start without changing row counts
//! - Occupant counters never go negative; decrement at zero is a no-op
//! - Increment on a missing row creates it at one
//! - Bootstrap runs before any session exists, so it zeroes every counter
//!   left over from a previous process

pub mod worker;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use cairn_core::{Environment, SyncAction, WorldGraph};

use crate::storage::{
    CharacterState, CharacterUpdate, DEFAULT_HEALTH, ItemState, NpcState, Occupancy, RoomState,
    RoomUpdate, Storage, StorageError,
};

/// Errors from synchronizer operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The store rejected a call.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A character was placed in a room the world graph doesn't have.
    #[error("unknown room {0:?}")]
    UnknownRoom(String),
}

/// Rows created by one [`StateSynchronizer::bootstrap`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// `RoomState` rows created
    pub rooms_created: usize,
    /// `CharacterState` rows created
    pub characters_created: usize,
    /// Stale occupant counters reset to zero
    pub rooms_reconciled: usize,
}

/// Reconciles live state with the durable store.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct StateSynchronizer<S: Storage, E: Environment> {
    storage: S,
    env: E,
    world: Arc<WorldGraph>,
}

impl<S: Storage, E: Environment> StateSynchronizer<S, E> {
    /// Create a synchronizer over `storage` for rooms of `world`.
    pub fn new(storage: S, env: E, world: Arc<WorldGraph>) -> Self {
        Self { storage, env, world }
    }

    /// Underlying store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create a character's state with status `"active"` unless it exists.
    ///
    /// Returns whether a row was created.
    pub fn initialize_character_state(
        &self,
        character_id: &str,
        room_id: &str,
        health: i32,
    ) -> Result<bool, SyncError> {
        self.check_room(room_id)?;
        let state = CharacterState::new(character_id, room_id, health, self.now());
        Ok(self.storage.create_character_state(&state)?)
    }

    /// Create an empty room state unless it exists.
    ///
    /// Returns whether a row was created.
    pub fn initialize_room_state(&self, room_id: &str) -> Result<bool, SyncError> {
        Ok(self.storage.create_room_state(&RoomState::new(room_id, self.now()))?)
    }

    /// Initialize state for every room and every known character, then
    /// reconcile occupancy with the (empty) live registry.
    ///
    /// Known characters are the store's character templates plus any
    /// character a user record is bound to. A character starts in its user's
    /// last room if the world has it, else the start room. Safe to call on
    /// every process start.
    pub fn bootstrap(&self) -> Result<BootstrapReport, SyncError> {
        let mut report = BootstrapReport::default();

        let mut room_ids: Vec<&str> = self.world.rooms().map(|r| r.id.as_str()).collect();
        room_ids.sort_unstable();
        for room_id in room_ids {
            if self.initialize_room_state(room_id)? {
                report.rooms_created += 1;
            }
        }

        let user_rooms: HashMap<String, String> = self
            .storage
            .list_users()?
            .into_iter()
            .map(|u| (u.character_id, u.room_id))
            .collect();

        let mut characters: BTreeMap<String, i32> = user_rooms
            .keys()
            .map(|id| (id.clone(), DEFAULT_HEALTH))
            .collect();
        for character in self.storage.list_characters()? {
            characters.insert(character.id, character.health);
        }

        for (character_id, health) in &characters {
            let room_id = match user_rooms.get(character_id) {
                Some(room) if self.world.contains(room) => room.as_str(),
                _ => self.world.start_room().id.as_str(),
            };
            if self.initialize_character_state(character_id, room_id, *health)? {
                report.characters_created += 1;
            }
        }

        report.rooms_reconciled = self.reconcile_occupancy()?;

        tracing::info!(
            rooms_created = report.rooms_created,
            characters_created = report.characters_created,
            rooms_reconciled = report.rooms_reconciled,
            "state bootstrap complete"
        );

        Ok(report)
    }

    /// Add one occupant to a room, creating its state if needed.
    ///
    /// Returns the new count.
    pub fn increment_occupancy(&self, room_id: &str) -> Result<u32, SyncError> {
        Ok(self.storage.adjust_occupancy(room_id, Occupancy::Increment, self.now())?)
    }

    /// Remove one occupant from a room. No-op at zero or on a missing row.
    ///
    /// Returns the new count.
    pub fn decrement_occupancy(&self, room_id: &str) -> Result<u32, SyncError> {
        Ok(self.storage.adjust_occupancy(room_id, Occupancy::Decrement, self.now())?)
    }

    /// Zero every occupant counter that is not already zero.
    ///
    /// Only valid while no session is live: counters left by a process that
    /// died before its sessions ended are stale. Row counts are unchanged.
    /// Returns how many rows were reset.
    pub fn reconcile_occupancy(&self) -> Result<usize, SyncError> {
        let now = self.now();
        let mut reset = 0;

        for state in self.storage.list_room_states()? {
            if state.occupants == 0 {
                continue;
            }
            tracing::info!(
                room_id = %state.room_id,
                stale = state.occupants,
                "resetting stale occupancy"
            );
            self.storage.update_room_state(&state.room_id, &RoomUpdate::Occupants(0), now)?;
            reset += 1;
        }

        Ok(reset)
    }

    /// Replace the NPCs recorded for a room.
    pub fn update_npc_state(
        &self,
        room_id: &str,
        npcs: Vec<NpcState>,
    ) -> Result<RoomState, SyncError> {
        self.update_room(room_id, &RoomUpdate::Npcs(npcs))
    }

    /// Replace the items recorded for a room.
    pub fn update_item_state(
        &self,
        room_id: &str,
        items: Vec<ItemState>,
    ) -> Result<RoomState, SyncError> {
        self.update_room(room_id, &RoomUpdate::Items(items))
    }

    /// NPCs recorded for a room. Empty if the room has no state yet.
    pub fn npc_state(&self, room_id: &str) -> Result<Vec<NpcState>, SyncError> {
        Ok(self.storage.load_room_state(room_id)?.map(|s| s.npcs).unwrap_or_default())
    }

    /// Items recorded for a room. Empty if the room has no state yet.
    pub fn item_state(&self, room_id: &str) -> Result<Vec<ItemState>, SyncError> {
        Ok(self.storage.load_room_state(room_id)?.map(|s| s.items).unwrap_or_default())
    }

    /// Characters whose durable state places them in `room_id`.
    pub fn characters_in_room(&self, room_id: &str) -> Result<Vec<CharacterState>, SyncError> {
        Ok(self.storage.list_characters_in_room(room_id)?)
    }

    /// Record a character's current room.
    pub fn update_character_room(
        &self,
        character_id: &str,
        room_id: &str,
    ) -> Result<CharacterState, SyncError> {
        self.check_room(room_id)?;
        self.update_character(character_id, &CharacterUpdate::Room(room_id.to_string()))
    }

    /// Record a character's health.
    pub fn update_character_health(
        &self,
        character_id: &str,
        health: i32,
    ) -> Result<CharacterState, SyncError> {
        self.update_character(character_id, &CharacterUpdate::Health(health))
    }

    /// Record a character's status tag.
    pub fn update_character_status(
        &self,
        character_id: &str,
        status: &str,
    ) -> Result<CharacterState, SyncError> {
        self.update_character(character_id, &CharacterUpdate::Status(status.to_string()))
    }

    /// Mirror one session event into the store.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn apply(&self, action: &SyncAction) -> Result<(), SyncError> {
        let results = match action {
            SyncAction::SessionStarted { character_id, room_id } => vec![
                self.increment_occupancy(room_id).map(drop),
                self.update_character_room(character_id, room_id).map(drop),
            ],
            SyncAction::CharacterMoved { character_id, from_room, to_room } => vec![
                self.decrement_occupancy(from_room).map(drop),
                self.increment_occupancy(to_room).map(drop),
                self.update_character_room(character_id, to_room).map(drop),
            ],
            SyncAction::SessionEnded { room_id, .. } => {
                vec![self.decrement_occupancy(room_id).map(drop)]
            },
        };

        results.into_iter().collect()
    }

    /// Apply an update, creating the row first if the character has none.
    fn update_character(
        &self,
        character_id: &str,
        update: &CharacterUpdate,
    ) -> Result<CharacterState, SyncError> {
        let now = self.now();
        match self.storage.update_character_state(character_id, update, now) {
            Err(StorageError::NotFound(_)) => {
                let room_id = match update {
                    CharacterUpdate::Room(room_id) => room_id.as_str(),
                    _ => self.world.start_room().id.as_str(),
                };
                tracing::debug!(%character_id, %room_id, "initializing character state lazily");
                self.initialize_character_state(character_id, room_id, DEFAULT_HEALTH)?;
                Ok(self.storage.update_character_state(character_id, update, now)?)
            },
            result => Ok(result?),
        }
    }

    /// Apply a room update, creating the row first if the room has none.
    fn update_room(&self, room_id: &str, update: &RoomUpdate) -> Result<RoomState, SyncError> {
        self.check_room(room_id)?;
        let now = self.now();
        match self.storage.update_room_state(room_id, update, now) {
            Err(StorageError::NotFound(_)) => {
                self.initialize_room_state(room_id)?;
                Ok(self.storage.update_room_state(room_id, update, now)?)
            },
            result => Ok(result?),
        }
    }

    fn check_room(&self, room_id: &str) -> Result<(), SyncError> {
        if self.world.contains(room_id) {
            Ok(())
        } else {
            Err(SyncError::UnknownRoom(room_id.to_string()))
        }
    }

    fn now(&self) -> u64 {
        self.env.wall_clock_secs()
    }
}
