//! Chaos property tests for the state synchronizer.
//!
//! These tests verify synchronizer invariants against every backend, and
//! under `ChaoticStorage` fault injection:
//! - Occupant counters follow a clamped model and never underflow
//! - Bootstrap is idempotent for any number of calls
//! - Injected faults never change what a player sees

use std::sync::Arc;

use cairn_core::{Direction, Room, WorldGraph};
use cairn_server::{
    ChaoticStorage, MemoryStorage, PeerInfo, RedbStorage, ServerConfig, ServerContext, SimEnv,
    StateSynchronizer, Storage, StorageError, SyncError, credentials, serve_connection,
    sync::worker,
};
use proptest::prelude::*;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

fn world() -> Arc<WorldGraph> {
    Arc::new(
        WorldGraph::new(
            vec![
                Room::new("start", "A mossy clearing").with_exit(Direction::Up, "up_room"),
                Room::new("up_room", "A branch").with_exit(Direction::Down, "start"),
                Room::new("e_room", "A stream"),
            ],
            "start",
        )
        .unwrap(),
    )
}

/// Apply a +1/-1 sequence and check the counter against a clamped model at
/// every step.
fn check_clamped_counter<S: Storage>(storage: S, ops: &[bool]) -> Result<(), TestCaseError> {
    let sync = StateSynchronizer::new(storage, SimEnv::new(), world());
    let mut model = 0u32;

    for &increment in ops {
        let actual = if increment {
            model += 1;
            sync.increment_occupancy("start").unwrap()
        } else {
            model = model.saturating_sub(1);
            sync.decrement_occupancy("start").unwrap()
        };

        // ORACLE: counter equals the clamped running sum
        prop_assert_eq!(actual, model);
    }

    let stored = sync.storage().load_room_state("start").unwrap().map_or(0, |s| s.occupants);
    prop_assert_eq!(stored, model);
    Ok(())
}

#[test]
fn prop_occupancy_never_negative_memory() {
    proptest!(|(ops in prop::collection::vec(any::<bool>(), 0..200))| {
        check_clamped_counter(MemoryStorage::new(), &ops)?;
    });
}

#[test]
fn prop_occupancy_never_negative_redb() {
    proptest!(ProptestConfig::with_cases(16), |(ops in prop::collection::vec(any::<bool>(), 0..64))| {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("chaos.redb")).unwrap();
        check_clamped_counter(storage, &ops)?;
    });
}

#[test]
fn prop_chaos_faults_leave_counter_consistent() {
    proptest!(|(
        failure_rate in 0.0..0.8,
        seed in any::<u64>(),
        ops in prop::collection::vec(any::<bool>(), 0..200),
    )| {
        let storage = ChaoticStorage::with_seed(MemoryStorage::new(), failure_rate, seed);
        let sync = StateSynchronizer::new(storage.clone(), SimEnv::new(), world());
        let mut model = 0u32;

        for increment in ops {
            let result = if increment {
                sync.increment_occupancy("start")
            } else {
                sync.decrement_occupancy("start")
            };

            match result {
                Ok(count) => {
                    model = if increment { model + 1 } else { model.saturating_sub(1) };
                    prop_assert_eq!(count, model);
                },
                Err(SyncError::Storage(StorageError::Io(_))) => {
                    // ORACLE: a failed call leaves no partial write
                },
                Err(e) => prop_assert!(false, "unexpected error: {e:?}"),
            }
        }

        let stored = storage.inner().load_room_state("start").unwrap().map_or(0, |s| s.occupants);
        prop_assert_eq!(stored, model);
    });
}

#[test]
fn prop_bootstrap_idempotent() {
    proptest!(|(
        calls in 1usize..6,
        characters in prop::collection::vec("[a-z]{1,8}", 0..10),
    )| {
        let storage = MemoryStorage::new();
        let env = SimEnv::with_seed(1);
        for (i, character) in characters.iter().enumerate() {
            let user = credentials::new_user(&env, format!("user{i}"), "pw", character.clone(), "e_room");
            storage.put_user(&user).unwrap();
        }

        let sync = StateSynchronizer::new(storage.clone(), env, world());
        sync.bootstrap().unwrap();
        let rooms = storage.list_room_states().unwrap().len();
        let states = storage.list_character_states().unwrap().len();

        for _ in 1..calls {
            sync.bootstrap().unwrap();
        }

        // ORACLE: N calls leave the same row counts as one
        prop_assert_eq!(storage.list_room_states().unwrap().len(), rooms);
        prop_assert_eq!(storage.list_character_states().unwrap().len(), states);
        prop_assert_eq!(rooms, 3);
    });
}

/// Play one scripted session and return the client transcript.
///
/// `auth` answers the login; `mirror` receives the sync actions.
async fn transcript<A: Storage, M: Storage>(auth: A, mirror: M) -> String {
    let env = SimEnv::with_seed(21);
    let sync = StateSynchronizer::new(mirror, env.clone(), world());
    let (handle, _task) = worker::spawn(sync);
    let ctx = ServerContext::new(ServerConfig::default(), world(), env).with_storage(auth, handle);

    let (server, mut client) = duplex(64 * 1024);
    let (r, w) = split(server);
    client.write_all(b"ada\npw\nu\nlook\nd\nx\nquit\n").await.unwrap();
    serve_connection(&ctx, r, w, PeerInfo::new("chaos")).await;
    ctx.sync.flush().await;

    let mut out = String::new();
    client.read_to_string(&mut out).await.unwrap();
    out
}

fn seeded() -> MemoryStorage {
    let storage = MemoryStorage::new();
    let env = SimEnv::with_seed(8);
    storage.put_user(&credentials::new_user(&env, "ada", "pw", "char_ada", "start")).unwrap();
    storage
}

#[tokio::test]
async fn persistence_faults_never_reach_the_player() {
    let store = seeded();
    let clean = transcript(store.clone(), store).await;
    assert!(clean.contains("You move up.\n"));
    assert!(clean.contains("Unknown command: x\n"));
    assert!(clean.ends_with("Goodbye!\n"));

    for failure_rate in [0.3, 1.0] {
        let mirror = ChaoticStorage::with_seed(seeded(), failure_rate, 5);
        let out = transcript(seeded(), mirror.clone()).await;

        assert_eq!(out, clean);
        if failure_rate >= 1.0 {
            assert!(mirror.injected_failures() > 0);
        }
    }
}
