//! Storage error types.

/// Errors returned by [`Storage`](super::Storage) implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend I/O failure (disk, transaction, injected fault).
    ///
    /// Usually transient. Callers on the fire-and-forget sync path log and
    /// drop it.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// A stored value could not be encoded or decoded.
    ///
    /// Indicates corruption or an incompatible on-disk format.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// The row being updated does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
