//! World graph: rooms, exits and the ten movement directions.
//!
//! The graph is immutable once built and shared behind an `Arc` for the
//! lifetime of the process. Construction validates the topology: every exit
//! must resolve to a room in the graph and the start room must exist. A
//! graph that fails validation must never reach the session layer.

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

/// One of the ten directions an exit can point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// north
    North,
    /// south
    South,
    /// east
    East,
    /// west
    West,
    /// northeast
    Northeast,
    /// northwest
    Northwest,
    /// southeast
    Southeast,
    /// southwest
    Southwest,
    /// up
    Up,
    /// down
    Down,
}

impl Direction {
    /// All ten directions.
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Northeast,
        Direction::Northwest,
        Direction::Southeast,
        Direction::Southwest,
        Direction::Up,
        Direction::Down,
    ];

    /// Full lowercase name, as typed by players and stored in world files.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::South => "south",
            Self::East => "east",
            Self::West => "west",
            Self::Northeast => "northeast",
            Self::Northwest => "northwest",
            Self::Southeast => "southeast",
            Self::Southwest => "southwest",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Short form accepted at the prompt (`n`, `ne`, `u`, ...).
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::North => "n",
            Self::South => "s",
            Self::East => "e",
            Self::West => "w",
            Self::Northeast => "ne",
            Self::Northwest => "nw",
            Self::Southeast => "se",
            Self::Southwest => "sw",
            Self::Up => "u",
            Self::Down => "d",
        }
    }

    /// Direction for an abbreviation. `None` for anything else.
    pub fn from_abbreviation(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.abbreviation() == word)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no direction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction: {0:?}")]
pub struct ParseDirectionError(pub String);

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ParseDirectionError(s.to_string()))
    }
}

/// A node of the world graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    /// Stable room id (`"start"`, `"up_room"`, ...)
    pub id: String,
    /// Text shown on entry and on `look`
    pub description: String,
    /// Text shown on `look`
    pub smells: String,
    /// Direction → target room id
    pub exits: HashMap<Direction, String>,
}

impl Room {
    /// Create a room with no smells and no exits.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            smells: String::new(),
            exits: HashMap::new(),
        }
    }

    /// Set the smells text.
    #[must_use]
    pub fn with_smells(mut self, smells: impl Into<String>) -> Self {
        self.smells = smells.into();
        self
    }

    /// Add (or replace) an exit.
    #[must_use]
    pub fn with_exit(mut self, direction: Direction, target: impl Into<String>) -> Self {
        self.exits.insert(direction, target.into());
        self
    }

    /// Target room id for `direction`. `None` if there is no such exit.
    pub fn exit(&self, direction: Direction) -> Option<&str> {
        self.exits.get(&direction).map(String::as_str)
    }

    /// Exit direction names sorted alphabetically.
    pub fn exit_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.exits.keys().map(|d| d.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Topology errors detected while building a [`WorldGraph`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The designated start room is not in the graph.
    #[error("start room {0:?} not found")]
    MissingStartRoom(String),

    /// A room the deployment depends on is not in the graph.
    #[error("required room {0:?} not found")]
    MissingRequiredRoom(String),

    /// Two rooms share an id.
    #[error("duplicate room id {0:?}")]
    DuplicateRoom(String),

    /// An exit points at a room that does not exist.
    #[error("exit {direction} from room {room:?} leads to unknown room {target:?}")]
    DanglingExit {
        /// Room owning the exit
        room: String,
        /// Exit direction
        direction: Direction,
        /// Missing target id
        target: String,
    },
}

/// Immutable room/exit topology.
#[derive(Debug)]
pub struct WorldGraph {
    rooms: HashMap<String, Arc<Room>>,
    start: Arc<Room>,
}

impl WorldGraph {
    /// Build and validate a graph.
    ///
    /// Fails if room ids repeat, the start room is missing, or any exit
    /// targets a room that is not in `rooms`.
    pub fn new(
        rooms: impl IntoIterator<Item = Room>,
        start: impl Into<String>,
    ) -> Result<Self, WorldError> {
        let graph = Self::unvalidated(rooms, start)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Build a graph checking only ids and the start room.
    ///
    /// Exits are not resolved, so moves through a dangling exit fail at
    /// runtime with `MoveError::DanglingExit`. Meant for tooling and tests
    /// that exercise that path; the server always uses [`WorldGraph::new`].
    pub fn unvalidated(
        rooms: impl IntoIterator<Item = Room>,
        start: impl Into<String>,
    ) -> Result<Self, WorldError> {
        let start = start.into();
        let mut by_id = HashMap::new();

        for room in rooms {
            let id = room.id.clone();
            if by_id.insert(id.clone(), Arc::new(room)).is_some() {
                return Err(WorldError::DuplicateRoom(id));
            }
        }

        let start = by_id.get(&start).cloned().ok_or(WorldError::MissingStartRoom(start))?;

        Ok(Self { rooms: by_id, start })
    }

    /// Check that every exit resolves to a room in the graph.
    pub fn validate(&self) -> Result<(), WorldError> {
        match self.dangling_exits().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every exit that does not resolve, as `DanglingExit` errors.
    pub fn dangling_exits(&self) -> Vec<WorldError> {
        let mut dangling = Vec::new();
        for room in self.rooms.values() {
            for (direction, target) in &room.exits {
                if !self.rooms.contains_key(target) {
                    dangling.push(WorldError::DanglingExit {
                        room: room.id.clone(),
                        direction: *direction,
                        target: target.clone(),
                    });
                }
            }
        }
        dangling
    }

    /// Fail unless every id in `required` names a room.
    pub fn require<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Result<(), WorldError> {
        for id in required {
            if !self.rooms.contains_key(id) {
                return Err(WorldError::MissingRequiredRoom(id.to_string()));
            }
        }
        Ok(())
    }

    /// Room by id.
    pub fn room(&self, id: &str) -> Option<&Arc<Room>> {
        self.rooms.get(id)
    }

    /// Whether a room with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    /// The room new sessions start in.
    pub fn start_room(&self) -> &Arc<Room> {
        &self.start
    }

    /// All rooms, in no particular order.
    pub fn rooms(&self) -> impl Iterator<Item = &Arc<Room>> + '_ {
        self.rooms.values()
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the graph has no rooms. Never true for a constructed graph.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
