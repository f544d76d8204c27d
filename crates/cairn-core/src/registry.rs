//! Session registry for live player sessions.
//!
//! The registry maps session id → [`Session`] for every authenticated
//! connection. It is an owned object shared by reference (`Arc`) between
//! connection tasks; there is no process-wide singleton.
//!
//! All access goes through one reader/writer lock. Lookups take the read
//! side, create/remove/move take the write side. The lock is only ever held
//! across map operations, never across I/O, so a plain `std` lock is used.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    action::SyncAction,
    world::{Room, WorldGraph},
};

/// A connected player's live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Connection-scoped session id
    pub id: u64,
    /// Character the player controls
    pub character_id: String,
    /// Room the player is standing in
    pub room: Arc<Room>,
}

impl Session {
    /// Id of the current room.
    pub fn room_id(&self) -> &str {
        &self.room.id
    }

    /// Sync action announcing this session entering the world.
    pub fn started_action(&self) -> SyncAction {
        SyncAction::SessionStarted {
            character_id: self.character_id.clone(),
            room_id: self.room.id.clone(),
        }
    }

    /// Sync action announcing this session leaving the world.
    pub fn ended_action(&self) -> SyncAction {
        SyncAction::SessionEnded {
            character_id: self.character_id.clone(),
            room_id: self.room.id.clone(),
        }
    }
}

/// Registry of live sessions.
///
/// Holds no persistence knowledge; it is pure in-memory bookkeeping for the
/// lifetime of each connection.
#[derive(Debug)]
pub struct SessionRegistry {
    world: Arc<WorldGraph>,
    sessions: RwLock<HashMap<u64, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry over `world`.
    pub fn new(world: Arc<WorldGraph>) -> Self {
        Self { world, sessions: RwLock::new(HashMap::new()) }
    }

    /// World graph sessions move through.
    pub fn world(&self) -> &Arc<WorldGraph> {
        &self.world
    }

    /// Register a session in the start room.
    ///
    /// Returns `None` if `session_id` is already registered; the existing
    /// session is left untouched.
    pub fn create(&self, session_id: u64, character_id: impl Into<String>) -> Option<Session> {
        let mut sessions = self.write();
        if sessions.contains_key(&session_id) {
            return None;
        }

        let session = Session {
            id: session_id,
            character_id: character_id.into(),
            room: Arc::clone(self.world.start_room()),
        };
        sessions.insert(session_id, session.clone());
        Some(session)
    }

    /// Snapshot of a session. `None` if it doesn't exist.
    pub fn get(&self, session_id: u64) -> Option<Session> {
        self.read().get(&session_id).cloned()
    }

    /// Remove a session, returning its final state.
    pub fn remove(&self, session_id: u64) -> Option<Session> {
        self.write().remove(&session_id)
    }

    /// Check if a session is registered.
    pub fn contains(&self, session_id: u64) -> bool {
        self.read().contains_key(&session_id)
    }

    /// Total number of registered sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of sessions currently in `room_id`.
    ///
    /// This is the live value durable occupancy counters mirror.
    pub fn occupants(&self, room_id: &str) -> usize {
        self.read().values().filter(|s| s.room.id == room_id).count()
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<u64, Session>> {
        self.sessions.read().expect("session registry lock poisoned")
    }

    #[allow(clippy::expect_used)]
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<u64, Session>> {
        self.sessions.write().expect("session registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Direction;

    fn registry() -> SessionRegistry {
        let world = WorldGraph::new(
            vec![
                Room::new("start", "A mossy clearing").with_exit(Direction::North, "grove"),
                Room::new("grove", "A birch grove").with_exit(Direction::South, "start"),
            ],
            "start",
        )
        .unwrap();
        SessionRegistry::new(Arc::new(world))
    }

    #[test]
    fn create_places_session_in_start_room() {
        let registry = registry();

        let session = registry.create(1, "char_a").unwrap();
        assert_eq!(session.room_id(), "start");
        assert_eq!(session.character_id, "char_a");
        assert!(registry.contains(1));
        assert!(!registry.contains(2));
    }

    #[test]
    fn create_duplicate_session_fails() {
        let registry = registry();

        assert!(registry.create(1, "char_a").is_some());
        assert!(registry.create(1, "char_b").is_none());
        assert_eq!(registry.get(1).unwrap().character_id, "char_a");
    }

    #[test]
    fn remove_returns_final_state() {
        let registry = registry();
        registry.create(1, "char_a");

        let session = registry.remove(1).unwrap();
        assert_eq!(session.id, 1);
        assert!(registry.get(1).is_none());
        assert!(registry.remove(1).is_none());
    }

    #[test]
    fn session_count() {
        let registry = registry();
        assert!(registry.is_empty());

        registry.create(1, "a");
        registry.create(2, "b");
        assert_eq!(registry.len(), 2);

        registry.remove(1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn occupants_counts_sessions_per_room() {
        let registry = registry();
        registry.create(1, "a");
        registry.create(2, "b");

        assert_eq!(registry.occupants("start"), 2);
        assert_eq!(registry.occupants("grove"), 0);
    }

    #[test]
    fn lifecycle_actions_name_current_room() {
        let registry = registry();
        let session = registry.create(7, "char_a").unwrap();

        assert_eq!(
            session.started_action(),
            SyncAction::SessionStarted {
                character_id: "char_a".to_string(),
                room_id: "start".to_string(),
            }
        );
        assert_eq!(
            session.ended_action(),
            SyncAction::SessionEnded {
                character_id: "char_a".to_string(),
                room_id: "start".to_string(),
            }
        );
    }

    #[test]
    fn concurrent_creates_and_removes() {
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        let id = t * 1000 + i;
                        assert!(registry.create(id, "c").is_some());
                        if i % 2 == 0 {
                            assert!(registry.remove(id).is_some());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 50);
    }

    #[test]
    #[should_panic(expected = "session registry lock poisoned")]
    fn poisoned_lock_panics_on_next_access() {
        let registry = Arc::new(registry());

        let writer = Arc::clone(&registry);
        let result = std::thread::spawn(move || {
            let _guard = writer.write();
            std::panic::resume_unwind(Box::new("writer died"));
        })
        .join();
        assert!(result.is_err());

        let _ = registry.len();
    }
}
