//! Per-connection supervisor.
//!
//! Drives one connection from greeting to close:
//!
//! ```text
//! motd ─► authenticate ─► create session ─► loop { read line ─► dispatch ─► reply }
//!                                                   │
//!                              quit / EOF / fault ──┴─► remove session
//! ```
//!
//! The transport is any `AsyncRead`/`AsyncWrite` pair, so tests drive it over
//! `tokio::io::duplex` and the binary over TCP halves.

use std::sync::Arc;

use cairn_core::{Command, Environment, FAREWELL, SessionRegistry, WorldGraph, dispatch};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    auth::{self, AuthError, REJECTION},
    config::ServerConfig,
    framer::LineFramer,
    storage::Storage,
    sync::worker::SyncHandle,
};

/// Prompt sent after every completed command.
pub const PROMPT: &str = "\n> ";

/// Hint sent once after entering the world.
pub const HELP_HINT: &str = "Type 'help' for available commands.\n";

/// Shared state for all connections.
pub struct ServerContext<S: Storage, E: Environment> {
    /// Runtime configuration
    pub config: ServerConfig,
    /// Live sessions
    pub registry: Arc<SessionRegistry>,
    /// User store; `None` skips authentication
    pub storage: Option<S>,
    /// Queue for durable-state updates
    pub sync: SyncHandle,
    /// Time and randomness
    pub env: E,
}

impl<S: Storage, E: Environment> ServerContext<S, E> {
    /// Context without a store: no authentication, no durable state.
    pub fn new(config: ServerConfig, world: Arc<WorldGraph>, env: E) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new(world)),
            storage: None,
            sync: SyncHandle::disabled(),
            env,
        }
    }

    /// Authenticate against `storage` and mirror sessions through `sync`.
    #[must_use]
    pub fn with_storage(mut self, storage: S, sync: SyncHandle) -> Self {
        self.storage = Some(storage);
        self.sync = sync;
        self
    }
}

/// What the transport knows about the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerInfo {
    /// Remote address or identity
    pub addr: String,
    /// Terminal metadata, when negotiated
    pub terminal: Option<TerminalInfo>,
}

impl PeerInfo {
    /// Peer with no terminal metadata.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), terminal: None }
    }
}

/// Pseudo-terminal metadata. Logged, never acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalInfo {
    /// Terminal type (`xterm-256color`, ...)
    pub term: String,
    /// Columns
    pub width: u32,
    /// Rows
    pub height: u32,
}

/// Removes the session and queues its end action when dropped.
///
/// Covers every exit path, including task cancellation.
struct SessionGuard {
    id: u64,
    registry: Arc<SessionRegistry>,
    sync: SyncHandle,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.registry.remove(self.id) {
            tracing::info!(
                session_id = self.id,
                character_id = %session.character_id,
                room_id = %session.room_id(),
                "session closed"
            );
            self.sync.submit(session.ended_action());
        }
    }
}

/// Serve one connection until quit, close or fault.
pub async fn serve_connection<R, W, S, E>(
    ctx: &ServerContext<S, E>,
    reader: R,
    writer: W,
    peer: PeerInfo,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Storage,
    E: Environment,
{
    tracing::info!(peer = %peer.addr, "connection accepted");
    if let Some(terminal) = &peer.terminal {
        tracing::debug!(
            peer = %peer.addr,
            term = %terminal.term,
            width = terminal.width,
            height = terminal.height,
            "terminal negotiated"
        );
    }

    let mut framer = LineFramer::new(reader, writer).max_line_len(ctx.config.max_line_len);
    if framer.send(&format!("{}\n", ctx.config.motd)).await.is_err() {
        tracing::info!(peer = %peer.addr, "connection closed before login");
        return;
    }

    let (character_id, welcome) = match &ctx.storage {
        Some(storage) => match auth::authenticate(&mut framer, storage).await {
            Ok(identity) => {
                tracing::info!(
                    peer = %peer.addr,
                    username = %identity.username,
                    character_id = %identity.character_id,
                    "authenticated"
                );
                (identity.character_id, format!("Welcome {}!\n", identity.username))
            },
            Err(AuthError::Closed) => {
                tracing::info!(peer = %peer.addr, "connection closed during login");
                return;
            },
            Err(err) => {
                match &err {
                    AuthError::Lookup(_) => {
                        tracing::error!(peer = %peer.addr, error = %err, "authentication failed");
                    },
                    _ => tracing::info!(peer = %peer.addr, error = %err, "authentication rejected"),
                }
                let _ = framer.send(REJECTION).await;
                return;
            },
        },
        None => (ctx.config.default_character.clone(), String::new()),
    };

    let session = loop {
        if let Some(session) = ctx.registry.create(ctx.env.random_u64(), character_id.clone()) {
            break session;
        }
    };
    let session_id = session.id;
    let _guard = SessionGuard {
        id: session_id,
        registry: Arc::clone(&ctx.registry),
        sync: ctx.sync.clone(),
    };
    ctx.sync.submit(session.started_action());
    tracing::info!(
        session_id,
        peer = %peer.addr,
        %character_id,
        mirrored = ctx.sync.is_enabled(),
        "session started"
    );

    let greeting = format!(
        "{welcome}You are in: {}\n{HELP_HINT}{PROMPT}",
        session.room.description
    );
    if framer.send(&greeting).await.is_err() {
        return;
    }

    while let Some(line) = framer.read_line().await {
        let command = Command::parse(&line);
        tracing::trace!(session_id, ?command, "command");

        if command == Command::Quit {
            let _ = framer.send(FAREWELL).await;
            return;
        }

        let reply = dispatch(&ctx.registry, session_id, &command);
        // queued before the write so a cancelled send can't lose a move
        ctx.sync.submit_all(reply.actions);
        let sent = if reply.disconnect {
            framer.send(&reply.text).await
        } else {
            framer.send(&format!("{}{PROMPT}", reply.text)).await
        };

        if reply.disconnect || sent.is_err() {
            return;
        }
    }
}
