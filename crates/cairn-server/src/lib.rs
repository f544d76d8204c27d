//! Cairn production server.
//!
//! Runtime glue around [`cairn_core`]: a TCP accept loop, the line protocol,
//! authentication, the durable store and the background state synchronizer.
//!
//! # Architecture
//!
//! Each connection runs in its own task ([`serve_connection`]). Tasks share
//! the [`SessionRegistry`](cairn_core::SessionRegistry) and the store, nothing
//! else. Game logic in `cairn-core` returns [`SyncAction`](cairn_core::SyncAction)s;
//! the connection task answers the player and then hands the actions to the
//! [`SyncHandle`], whose single worker applies them to [`Storage`] on the
//! blocking pool.
//!
//! # Components
//!
//! - [`Server`]: accept loop over TCP
//! - [`LineFramer`]: CR/LF/CRLF line framing with echo
//! - [`authenticate`]: username/password exchange
//! - [`StateSynchronizer`]: mirrors occupancy and character state
//! - [`Storage`]: [`MemoryStorage`], [`RedbStorage`], [`ChaoticStorage`]
//! - [`SystemEnv`] / [`SimEnv`]: production and deterministic environments

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
mod config;
pub mod credentials;
mod error;
pub mod framer;
mod sim_env;
pub mod storage;
pub mod supervisor;
pub mod sync;
mod system_env;
pub mod world_file;

use std::{net::SocketAddr, sync::Arc};

pub use auth::{AuthError, Identity, REJECTION, authenticate};
use cairn_core::Environment;
pub use config::ServerConfig;
pub use error::ServerError;
pub use framer::LineFramer;
pub use sim_env::SimEnv;
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError};
pub use supervisor::{PeerInfo, ServerContext, TerminalInfo, serve_connection};
pub use sync::{BootstrapReport, StateSynchronizer, SyncError, worker::SyncHandle};
pub use system_env::SystemEnv;
use tokio::net::TcpListener;
pub use world_file::{WorldFile, WorldFileError};

/// Production cairn server.
///
/// Owns the listening socket and the shared [`ServerContext`].
pub struct Server<S: Storage, E: Environment> {
    listener: TcpListener,
    context: Arc<ServerContext<S, E>>,
}

impl<S: Storage, E: Environment> Server<S, E> {
    /// Bind to `context.config.bind_address`.
    pub async fn bind(context: ServerContext<S, E>) -> Result<Self, ServerError> {
        let address = &context.config.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::Transport(format!("cannot bind {address}: {e}")))?;

        Ok(Self { listener, context: Arc::new(context) })
    }

    /// Shared connection context.
    pub fn context(&self) -> &Arc<ServerContext<S, E>> {
        &self.context
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one task each.
    ///
    /// Accept errors are logged and the loop continues.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "server accepting connections");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let context = Arc::clone(&self.context);

                    tokio::spawn(async move {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer = %addr, error = %e, "set_nodelay failed");
                        }
                        let (reader, writer) = stream.into_split();
                        let peer = PeerInfo::new(addr.to_string());
                        serve_connection(&context, reader, writer, peer).await;
                        tracing::info!(peer = %addr, "connection closed");
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                },
            }
        }
    }
}
