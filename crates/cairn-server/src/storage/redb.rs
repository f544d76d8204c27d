//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! All state survives server restarts.

use std::{fmt::Display, path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{
    CharacterRecord, CharacterState, CharacterUpdate, Occupancy, RoomState, RoomUpdate, Storage,
    StorageError, UserRecord,
};

/// Table: users
/// Key: username
/// Value: CBOR-encoded UserRecord
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Table: characters
/// Key: character id
/// Value: CBOR-encoded CharacterRecord
const CHARACTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("characters");

/// Table: character_state
/// Key: character id
/// Value: CBOR-encoded CharacterState
const CHARACTER_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("character_state");

/// Table: room_state
/// Key: room id
/// Value: CBOR-encoded RoomState
const ROOM_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("room_state");

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc). Every
/// method runs in its own transaction.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (USERS, CHARACTERS,
    /// CHARACTER_STATE, ROOM_STATE).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(USERS).map_err(io)?;
            let _ = txn.open_table(CHARACTERS).map_err(io)?;
            let _ = txn.open_table(CHARACTER_STATE).map_err(io)?;
            let _ = txn.open_table(ROOM_STATE).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(table).map_err(io)?;

        match table.get(key).map_err(io)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = encode(value)?;

        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(table).map_err(io)?;
            table.insert(key, bytes.as_slice()).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    /// Insert unless `key` exists. Lookup and insert share one write
    /// transaction.
    fn insert_if_absent<T: Serialize>(
        &self,
        table: Table,
        key: &str,
        value: &T,
    ) -> Result<bool, StorageError> {
        let bytes = encode(value)?;

        let txn = self.db.begin_write().map_err(io)?;
        let created = {
            let mut table = txn.open_table(table).map_err(io)?;
            if table.get(key).map_err(io)?.is_some() {
                false
            } else {
                table.insert(key, bytes.as_slice()).map_err(io)?;
                true
            }
        };

        if created {
            txn.commit().map_err(io)?;
        } else {
            txn.abort().map_err(io)?;
        }

        Ok(created)
    }

    fn list<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(table).map_err(io)?;

        let mut values = Vec::new();
        for result in table.iter().map_err(io)? {
            let (_, value) = result.map_err(io)?;
            values.push(decode(value.value())?);
        }

        Ok(values)
    }
}

impl Storage for RedbStorage {
    fn put_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.put(USERS, &user.username, user)
    }

    fn load_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.get(USERS, username)
    }

    fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        self.list(USERS)
    }

    fn put_character(&self, character: &CharacterRecord) -> Result<(), StorageError> {
        self.put(CHARACTERS, &character.id, character)
    }

    fn load_character(&self, id: &str) -> Result<Option<CharacterRecord>, StorageError> {
        self.get(CHARACTERS, id)
    }

    fn list_characters(&self) -> Result<Vec<CharacterRecord>, StorageError> {
        self.list(CHARACTERS)
    }

    fn create_character_state(&self, state: &CharacterState) -> Result<bool, StorageError> {
        self.insert_if_absent(CHARACTER_STATE, &state.character_id, state)
    }

    fn load_character_state(&self, id: &str) -> Result<Option<CharacterState>, StorageError> {
        self.get(CHARACTER_STATE, id)
    }

    fn update_character_state(
        &self,
        id: &str,
        update: &CharacterUpdate,
        now: u64,
    ) -> Result<CharacterState, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let state = {
            let mut table = txn.open_table(CHARACTER_STATE).map_err(io)?;

            let current: Option<CharacterState> = match table.get(id).map_err(io)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            let mut state =
                current.ok_or_else(|| StorageError::NotFound(format!("character state {id}")))?;

            state.apply(update, now);
            let bytes = encode(&state)?;
            table.insert(id, bytes.as_slice()).map_err(io)?;
            state
        };

        txn.commit().map_err(io)?;

        Ok(state)
    }

    fn delete_character_state(&self, id: &str) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        let existed = {
            let mut table = txn.open_table(CHARACTER_STATE).map_err(io)?;
            table.remove(id).map_err(io)?.is_some()
        };
        txn.commit().map_err(io)?;

        Ok(existed)
    }

    fn list_character_states(&self) -> Result<Vec<CharacterState>, StorageError> {
        self.list(CHARACTER_STATE)
    }

    fn list_characters_in_room(&self, room_id: &str) -> Result<Vec<CharacterState>, StorageError> {
        let mut states: Vec<CharacterState> = self.list(CHARACTER_STATE)?;
        states.retain(|s| s.room_id == room_id);
        Ok(states)
    }

    fn create_room_state(&self, state: &RoomState) -> Result<bool, StorageError> {
        self.insert_if_absent(ROOM_STATE, &state.room_id, state)
    }

    fn load_room_state(&self, room_id: &str) -> Result<Option<RoomState>, StorageError> {
        self.get(ROOM_STATE, room_id)
    }

    fn adjust_occupancy(
        &self,
        room_id: &str,
        delta: Occupancy,
        now: u64,
    ) -> Result<u32, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let occupants = {
            let mut table = txn.open_table(ROOM_STATE).map_err(io)?;

            let current: Option<RoomState> = match table.get(room_id).map_err(io)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };

            let state = match (current, delta) {
                (Some(mut state), _) => {
                    state.adjust(delta, now);
                    Some(state)
                },
                (None, Occupancy::Increment) => {
                    let mut state = RoomState::new(room_id, now);
                    state.adjust(delta, now);
                    Some(state)
                },
                (None, Occupancy::Decrement) => None,
            };

            match state {
                Some(state) => {
                    let bytes = encode(&state)?;
                    table.insert(room_id, bytes.as_slice()).map_err(io)?;
                    state.occupants
                },
                None => 0,
            }
        };

        txn.commit().map_err(io)?;

        Ok(occupants)
    }

    fn update_room_state(
        &self,
        room_id: &str,
        update: &RoomUpdate,
        now: u64,
    ) -> Result<RoomState, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let state = {
            let mut table = txn.open_table(ROOM_STATE).map_err(io)?;

            let current: Option<RoomState> = match table.get(room_id).map_err(io)? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            let mut state =
                current.ok_or_else(|| StorageError::NotFound(format!("room state {room_id}")))?;

            state.apply(update, now);
            let bytes = encode(&state)?;
            table.insert(room_id, bytes.as_slice()).map_err(io)?;
            state
        };

        txn.commit().map_err(io)?;

        Ok(state)
    }

    fn list_room_states(&self) -> Result<Vec<RoomState>, StorageError> {
        self.list(ROOM_STATE)
    }
}

fn io(err: impl Display) -> StorageError {
    StorageError::Io(err.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}
