//! Cairn game core.
//!
//! Pure game logic for the cairn text world server: the world graph, live
//! session bookkeeping, movement and command dispatch. Nothing here performs
//! I/O.
//!
//! # Architecture
//!
//! Logic returns values instead of executing side effects. A dispatched
//! command yields a [`Reply`] carrying the text for the player and a list of
//! [`SyncAction`]s. The runtime in `cairn-server` writes the text, then hands
//! the actions to the state synchronizer, which owns all storage access.
//!
//! ```text
//! line ─► Command::parse ─► dispatch ─► Reply { text, actions, disconnect }
//!                              │
//!                              └─► SessionRegistry (move under write lock)
//! ```
//!
//! # Components
//!
//! - [`WorldGraph`]: immutable, validated room/exit topology
//! - [`SessionRegistry`]: session id → current room, shared between tasks
//! - [`SessionRegistry::move_session`]: the movement engine
//! - [`dispatch`]: command dispatcher
//! - [`Environment`]: time and randomness abstraction

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod command;
pub mod env;
pub mod movement;
pub mod registry;
pub mod world;

pub use action::SyncAction;
pub use command::{Command, FAREWELL, HELP_TEXT, Reply, describe_room, dispatch};
pub use env::Environment;
pub use movement::{Move, MoveError};
pub use registry::{Session, SessionRegistry};
pub use world::{Direction, ParseDirectionError, Room, WorldError, WorldGraph};
