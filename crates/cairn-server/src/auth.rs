//! Username/password challenge over the line framer.
//!
//! Unknown users and wrong passwords produce the same [`AuthError`] variant
//! and the caller sends the same [`REJECTION`] text for both, so a client
//! can't tell which usernames exist. Only lookup faults are distinguished,
//! and only in logs.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{credentials, framer::LineFramer, storage::Storage};

/// Prompt for the username.
pub const USERNAME_PROMPT: &str = "Username: ";

/// Prompt for the password.
pub const PASSWORD_PROMPT: &str = "Password: ";

/// The only rejection text a client ever sees.
pub const REJECTION: &str = "Invalid username or password. Disconnecting.\n";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User id
    pub user_id: u64,
    /// Login name
    pub username: String,
    /// Character the user plays
    pub character_id: String,
    /// Last known room id
    pub room_id: String,
}

/// Why authentication failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Blank username or password.
    #[error("empty {0}")]
    EmptyCredential(&'static str),

    /// Unknown user or wrong password. Deliberately not split.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The user store failed.
    #[error("user lookup failed: {0}")]
    Lookup(String),

    /// The stream closed or faulted mid-exchange.
    #[error("connection closed during authentication")]
    Closed,
}

/// Run the username/password exchange.
///
/// The store lookup runs on the blocking pool.
pub async fn authenticate<R, W, S>(
    framer: &mut LineFramer<R, W>,
    storage: &S,
) -> Result<Identity, AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Storage,
{
    let username = prompt(framer, USERNAME_PROMPT, "username").await?;
    let password = prompt(framer, PASSWORD_PROMPT, "password").await?;

    let lookup = {
        let storage = storage.clone();
        let username = username.clone();
        tokio::task::spawn_blocking(move || storage.load_user(&username))
    };

    let user = match lookup.await {
        Ok(Ok(user)) => user,
        Ok(Err(err)) => return Err(AuthError::Lookup(err.to_string())),
        Err(err) => return Err(AuthError::Lookup(err.to_string())),
    };

    match user {
        Some(user) if credentials::verify(&user, &password) => Ok(Identity {
            user_id: user.id,
            username: user.username,
            character_id: user.character_id,
            room_id: user.room_id,
        }),
        _ => Err(AuthError::InvalidCredentials),
    }
}

async fn prompt<R, W>(
    framer: &mut LineFramer<R, W>,
    text: &str,
    field: &'static str,
) -> Result<String, AuthError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    framer.send(text).await.map_err(|_| AuthError::Closed)?;

    let line = framer.read_line().await.ok_or(AuthError::Closed)?;
    let value = line.trim();
    if value.is_empty() {
        return Err(AuthError::EmptyCredential(field));
    }

    Ok(value.to_string())
}
