//! Server error types.

use std::fmt;

use crate::{storage::StorageError, world_file::WorldFileError};

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (conflicting flags, unusable paths, etc.).
    ///
    /// Fatal. Fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, accept error, etc.).
    ///
    /// May be transient (accept) or fatal (bind address in use).
    Transport(String),

    /// The world file could not be loaded or failed validation.
    ///
    /// Fatal at startup: the server never runs on a broken world graph.
    World(WorldFileError),

    /// The durable store could not be opened or seeded.
    Storage(StorageError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::World(err) => write!(f, "world error: {err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::World(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<WorldFileError> for ServerError {
    fn from(err: WorldFileError) -> Self {
        Self::World(err)
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
