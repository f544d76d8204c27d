//! JSON world file: rooms plus optional seed characters and users.
//!
//! ```json
//! {
//!   "start": "start",
//!   "required_rooms": ["start", "up_room"],
//!   "rooms": [
//!     { "id": "start", "description": "...", "smells": "...",
//!       "exits": { "up": "up_room" } }
//!   ],
//!   "characters": [{ "id": "hero", "name": "Hero", "health": 100 }],
//!   "users": [{ "username": "ada", "password": "...",
//!               "character_id": "hero", "room_id": "start" }]
//! }
//! ```

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use cairn_core::{Direction, Environment, Room, WorldError, WorldGraph};
use serde::Deserialize;

use crate::{
    credentials,
    storage::{CharacterRecord, DEFAULT_HEALTH, Storage, StorageError},
};

/// Errors loading a world file.
#[derive(Debug, thiserror::Error)]
pub enum WorldFileError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid world JSON.
    #[error("invalid world file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An exit names something other than the ten directions.
    #[error("room {room:?} has exit with unknown direction {direction:?}")]
    UnknownDirection {
        /// Room owning the exit
        room: String,
        /// Direction text as written
        direction: String,
    },

    /// The rooms do not form a valid graph.
    #[error(transparent)]
    World(#[from] WorldError),
}

fn default_start() -> String {
    "start".to_string()
}

fn default_health() -> i32 {
    DEFAULT_HEALTH
}

/// Parsed world file.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldFile {
    /// Start room id
    #[serde(default = "default_start")]
    pub start: String,
    /// Rooms that must exist
    #[serde(default)]
    pub required_rooms: Vec<String>,
    /// Room definitions
    pub rooms: Vec<RoomEntry>,
    /// Seed character templates
    #[serde(default)]
    pub characters: Vec<CharacterEntry>,
    /// Seed users
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

/// One room as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomEntry {
    /// Room id
    pub id: String,
    /// Description
    pub description: String,
    /// Smells text
    #[serde(default)]
    pub smells: String,
    /// Direction name → target room id
    #[serde(default)]
    pub exits: BTreeMap<String, String>,
}

/// A seed character template.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterEntry {
    /// Character id
    pub id: String,
    /// Display name
    pub name: String,
    /// Starting health
    #[serde(default = "default_health")]
    pub health: i32,
}

/// A seed user. The password is hashed on merge and never stored.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    /// Login name
    pub username: String,
    /// Plain password
    pub password: String,
    /// Character the user plays
    pub character_id: String,
    /// Initial room id
    #[serde(default = "default_start")]
    pub room_id: String,
}

/// Rows written by [`WorldFile::merge_into`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Character templates upserted
    pub characters: usize,
    /// Users upserted
    pub users: usize,
}

impl WorldFile {
    /// Read and parse a world file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WorldFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| WorldFileError::Read { path: path.to_path_buf(), source })?;
        Self::parse(&text)
    }

    /// Parse world JSON.
    pub fn parse(text: &str) -> Result<Self, WorldFileError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the validated world graph.
    ///
    /// Fails on unknown direction names, dangling exits, a missing start room
    /// or a missing required room.
    pub fn to_graph(&self) -> Result<WorldGraph, WorldFileError> {
        let mut rooms = Vec::with_capacity(self.rooms.len());
        for entry in &self.rooms {
            let mut room = Room::new(entry.id.clone(), entry.description.clone())
                .with_smells(entry.smells.clone());
            for (name, target) in &entry.exits {
                let direction: Direction =
                    name.parse().map_err(|_| WorldFileError::UnknownDirection {
                        room: entry.id.clone(),
                        direction: name.clone(),
                    })?;
                room = room.with_exit(direction, target.clone());
            }
            rooms.push(room);
        }

        let graph = WorldGraph::new(rooms, self.start.clone())?;
        graph.require(self.required_rooms.iter().map(String::as_str))?;
        Ok(graph)
    }

    /// Upsert seed characters and users into `storage`.
    ///
    /// Existing users keep their id; their credentials and binding are
    /// replaced.
    pub fn merge_into<S: Storage, E: Environment>(
        &self,
        storage: &S,
        env: &E,
    ) -> Result<SeedReport, StorageError> {
        let mut report = SeedReport::default();

        for entry in &self.characters {
            storage.put_character(&CharacterRecord {
                id: entry.id.clone(),
                name: entry.name.clone(),
                health: entry.health,
            })?;
            report.characters += 1;
        }

        for entry in &self.users {
            let mut user = credentials::new_user(
                env,
                entry.username.clone(),
                &entry.password,
                entry.character_id.clone(),
                entry.room_id.clone(),
            );
            if let Some(existing) = storage.load_user(&entry.username)? {
                user.id = existing.id;
            }
            storage.put_user(&user)?;
            report.users += 1;
        }

        tracing::info!(characters = report.characters, users = report.users, "seed data merged");

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SimEnv, storage::MemoryStorage};

    const WORLD: &str = r#"{
        "required_rooms": ["start", "up_room"],
        "rooms": [
            { "id": "start", "description": "A clearing", "smells": "Moss",
              "exits": { "up": "up_room", "east": "e_room" } },
            { "id": "up_room", "description": "A branch", "exits": { "down": "start" } },
            { "id": "e_room", "description": "A stream", "exits": { "west": "start" } }
        ],
        "characters": [{ "id": "hero", "name": "Hero" }],
        "users": [{ "username": "ada", "password": "pw", "character_id": "hero" }]
    }"#;

    #[test]
    fn parses_and_builds_graph() {
        let file = WorldFile::parse(WORLD).unwrap();
        assert_eq!(file.start, "start");
        assert_eq!(file.characters[0].health, DEFAULT_HEALTH);
        assert_eq!(file.users[0].room_id, "start");

        let graph = file.to_graph().unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.start_room().smells, "Moss");
        assert_eq!(graph.room("start").unwrap().exit(Direction::East), Some("e_room"));
    }

    #[test]
    fn unknown_direction_fails() {
        let file = WorldFile::parse(
            r#"{ "rooms": [{ "id": "start", "description": "x", "exits": { "sideways": "start" } }] }"#,
        )
        .unwrap();

        assert!(matches!(
            file.to_graph(),
            Err(WorldFileError::UnknownDirection { direction, .. }) if direction == "sideways"
        ));
    }

    #[test]
    fn dangling_exit_fails() {
        let file = WorldFile::parse(
            r#"{ "rooms": [{ "id": "start", "description": "x", "exits": { "north": "void" } }] }"#,
        )
        .unwrap();

        assert!(matches!(
            file.to_graph(),
            Err(WorldFileError::World(WorldError::DanglingExit { .. }))
        ));
    }

    #[test]
    fn missing_required_room_fails() {
        let file = WorldFile::parse(
            r#"{ "required_rooms": ["nw_room"], "rooms": [{ "id": "start", "description": "x" }] }"#,
        )
        .unwrap();

        assert!(matches!(
            file.to_graph(),
            Err(WorldFileError::World(WorldError::MissingRequiredRoom(id))) if id == "nw_room"
        ));
    }

    #[test]
    fn merge_upserts_and_keeps_user_id() {
        let file = WorldFile::parse(WORLD).unwrap();
        let storage = MemoryStorage::new();
        let env = SimEnv::with_seed(3);

        let report = file.merge_into(&storage, &env).unwrap();
        assert_eq!(report, SeedReport { characters: 1, users: 1 });
        let first = storage.load_user("ada").unwrap().unwrap();
        assert!(credentials::verify(&first, "pw"));

        file.merge_into(&storage, &env).unwrap();
        let second = storage.load_user("ada").unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(storage.list_users().unwrap().len(), 1);
        assert_eq!(storage.list_characters().unwrap().len(), 1);
    }
}
