use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{
    CharacterRecord, CharacterState, CharacterUpdate, Occupancy, RoomState, RoomUpdate, Storage,
    StorageError, UserRecord,
};

/// In-memory storage implementation for tests and store-less runs.
///
/// All state is wrapped in `Arc<Mutex<>>` to allow Clone and concurrent
/// access. Every method takes the lock once, so each call is atomic.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Users keyed by username
    users: HashMap<String, UserRecord>,

    /// Character templates keyed by id
    characters: HashMap<String, CharacterRecord>,

    /// Character state keyed by character id
    character_states: HashMap<String, CharacterState>,

    /// Room state keyed by room id
    room_states: HashMap<String, RoomState>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().expect("Mutex poisoned")
    }
}

impl Storage for MemoryStorage {
    fn put_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.lock().users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    fn load_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.lock().users.get(username).cloned())
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        Ok(self.lock().users.values().cloned().collect())
    }

    fn put_character(&self, character: &CharacterRecord) -> Result<(), StorageError> {
        self.lock().characters.insert(character.id.clone(), character.clone());
        Ok(())
    }

    fn load_character(&self, id: &str) -> Result<Option<CharacterRecord>, StorageError> {
        Ok(self.lock().characters.get(id).cloned())
    }

    fn list_characters(&self) -> Result<Vec<CharacterRecord>, StorageError> {
        Ok(self.lock().characters.values().cloned().collect())
    }

    fn create_character_state(&self, state: &CharacterState) -> Result<bool, StorageError> {
        let mut inner = self.lock();
        if inner.character_states.contains_key(&state.character_id) {
            return Ok(false);
        }
        inner.character_states.insert(state.character_id.clone(), state.clone());
        Ok(true)
    }

    fn load_character_state(&self, id: &str) -> Result<Option<CharacterState>, StorageError> {
        Ok(self.lock().character_states.get(id).cloned())
    }

    fn update_character_state(
        &self,
        id: &str,
        update: &CharacterUpdate,
        now: u64,
    ) -> Result<CharacterState, StorageError> {
        let mut inner = self.lock();
        let state = inner
            .character_states
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("character state {id}")))?;
        state.apply(update, now);
        Ok(state.clone())
    }

    fn delete_character_state(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.lock().character_states.remove(id).is_some())
    }

    fn list_character_states(&self) -> Result<Vec<CharacterState>, StorageError> {
        Ok(self.lock().character_states.values().cloned().collect())
    }

    fn list_characters_in_room(&self, room_id: &str) -> Result<Vec<CharacterState>, StorageError> {
        Ok(self
            .lock()
            .character_states
            .values()
            .filter(|s| s.room_id == room_id)
            .cloned()
            .collect())
    }

    fn create_room_state(&self, state: &RoomState) -> Result<bool, StorageError> {
        let mut inner = self.lock();
        if inner.room_states.contains_key(&state.room_id) {
            return Ok(false);
        }
        inner.room_states.insert(state.room_id.clone(), state.clone());
        Ok(true)
    }

    fn load_room_state(&self, room_id: &str) -> Result<Option<RoomState>, StorageError> {
        Ok(self.lock().room_states.get(room_id).cloned())
    }

    fn adjust_occupancy(
        &self,
        room_id: &str,
        delta: Occupancy,
        now: u64,
    ) -> Result<u32, StorageError> {
        let mut inner = self.lock();
        if let Some(state) = inner.room_states.get_mut(room_id) {
            state.adjust(delta, now);
            return Ok(state.occupants);
        }

        match delta {
            Occupancy::Increment => {
                let mut state = RoomState::new(room_id, now);
                state.adjust(delta, now);
                inner.room_states.insert(room_id.to_string(), state);
                Ok(1)
            },
            Occupancy::Decrement => Ok(0),
        }
    }

    fn update_room_state(
        &self,
        room_id: &str,
        update: &RoomUpdate,
        now: u64,
    ) -> Result<RoomState, StorageError> {
        let mut inner = self.lock();
        let state = inner
            .room_states
            .get_mut(room_id)
            .ok_or_else(|| StorageError::NotFound(format!("room state {room_id}")))?;
        state.apply(update, now);
        Ok(state.clone())
    }

    fn list_room_states(&self) -> Result<Vec<RoomState>, StorageError> {
        Ok(self.lock().room_states.values().cloned().collect())
    }
}
