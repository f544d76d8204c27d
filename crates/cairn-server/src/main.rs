//! Cairn server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve data/world.json with the durable store at data/cairn.redb
//! cairn-server --bind 0.0.0.0:2222
//!
//! # First run: load the seed users and characters into the store
//! cairn-server --merge-seed
//!
//! # No store: every connection plays the default character
//! cairn-server --no-db --default-character guest
//! ```
//!
//! The binary speaks plain TCP. Put a secure transport in front of it.

use std::{path::PathBuf, sync::Arc};

use cairn_core::Environment;
use cairn_server::{
    RedbStorage, Server, ServerConfig, ServerContext, ServerError, StateSynchronizer, Storage,
    SystemEnv, WorldFile, sync::worker,
};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Cairn text world server
#[derive(Parser, Debug)]
#[command(name = "cairn-server")]
#[command(about = "Multi-user text world server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:2222")]
    bind: String,

    /// World file (rooms, seed characters and users)
    #[arg(short, long, default_value = "data/world.json")]
    world: PathBuf,

    /// Durable store path
    #[arg(long, default_value = "data/cairn.redb")]
    db: PathBuf,

    /// Run without a durable store (skips authentication)
    #[arg(long)]
    no_db: bool,

    /// Upsert the world file's seed characters and users before starting
    #[arg(long, conflicts_with = "no_db")]
    merge_seed: bool,

    /// Bytes kept per input line
    #[arg(long, default_value = "1024")]
    max_line_len: usize,

    /// Character bound to sessions when running without a store
    #[arg(long, default_value = "guest")]
    default_character: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Cairn server starting");

    let world_file = WorldFile::load(&args.world)?;
    let world = Arc::new(world_file.to_graph()?);
    tracing::info!(
        path = %args.world.display(),
        rooms = world.len(),
        start = %world.start_room().id,
        "world loaded"
    );

    let env = SystemEnv::new();
    let config = ServerConfig {
        bind_address: args.bind,
        max_line_len: args.max_line_len,
        default_character: args.default_character,
        ..Default::default()
    };

    if args.no_db {
        tracing::warn!("No durable store - authentication disabled, state not persisted");
        let context = ServerContext::<RedbStorage, _>::new(config, world, env);
        return serve(Server::bind(context).await?).await;
    }

    if let Some(parent) = args.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ServerError::Config(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    let storage = RedbStorage::open(&args.db)?;
    tracing::info!(path = %args.db.display(), "store opened");

    if args.merge_seed {
        world_file.merge_into(&storage, &env)?;
    }

    let sync = StateSynchronizer::new(storage.clone(), env.clone(), Arc::clone(&world));
    if let Err(err) = sync.bootstrap() {
        tracing::warn!(error = %err, "state bootstrap failed; continuing with live state only");
    }

    let (handle, _worker) = worker::spawn(sync);
    let context = ServerContext::new(config, world, env).with_storage(storage, handle);

    serve(Server::bind(context).await?).await
}

/// Run until the server fails or Ctrl-C, then drain queued state updates.
async fn serve<S: Storage, E: Environment>(
    server: Server<S, E>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Server listening on {}", server.local_addr()?);
    let sync = server.context().sync.clone();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            sync.flush().await;
        },
    }

    Ok(())
}
