//! Property tests for the movement engine and session registry.
//!
//! Random command walks over a fixed world must keep the registry consistent:
//! every session stays on a real room, failed moves change nothing, and the
//! emitted sync actions replay to the same per-room occupancy the registry
//! reports.

use std::{collections::HashMap, sync::Arc};

use cairn_core::{
    Command, Direction, Room, SessionRegistry, SyncAction, WorldGraph, dispatch,
};
use proptest::prelude::*;

fn world() -> Arc<WorldGraph> {
    let rooms = vec![
        Room::new("start", "A mossy clearing")
            .with_exit(Direction::Up, "up_room")
            .with_exit(Direction::Northwest, "nw_room")
            .with_exit(Direction::East, "e_room"),
        Room::new("up_room", "A branch high in an oak").with_exit(Direction::Down, "start"),
        Room::new("nw_room", "A bramble thicket")
            .with_exit(Direction::Southeast, "start")
            .with_exit(Direction::North, "e_room"),
        Room::new("e_room", "A quiet stream").with_exit(Direction::West, "start"),
    ];
    Arc::new(WorldGraph::new(rooms, "start").unwrap())
}

fn direction() -> impl Strategy<Value = Direction> {
    (0..Direction::ALL.len()).prop_map(|i| Direction::ALL[i])
}

/// Apply sync actions to a simple occupancy model.
fn replay(actions: &[SyncAction]) -> HashMap<String, i64> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for action in actions {
        match action {
            SyncAction::SessionStarted { room_id, .. } => {
                *counts.entry(room_id.clone()).or_default() += 1;
            },
            SyncAction::CharacterMoved { from_room, to_room, .. } => {
                *counts.entry(from_room.clone()).or_default() -= 1;
                *counts.entry(to_room.clone()).or_default() += 1;
            },
            SyncAction::SessionEnded { room_id, .. } => {
                *counts.entry(room_id.clone()).or_default() -= 1;
            },
        }
    }
    counts
}

#[test]
fn prop_moves_follow_exits() {
    proptest!(|(steps in prop::collection::vec(direction(), 0..64))| {
        let world = world();
        let registry = SessionRegistry::new(Arc::clone(&world));
        registry.create(1, "hero");

        for direction in steps {
            let before = registry.get(1).unwrap();
            match registry.move_session(1, direction) {
                Ok(mv) => {
                    // ORACLE: the move followed an exit of the old room
                    prop_assert_eq!(before.room.exit(direction), Some(mv.to.id.as_str()));
                    let after = registry.get(1).unwrap();
                    prop_assert_eq!(after.room_id(), mv.to.id.as_str());
                },
                Err(_) => {
                    // ORACLE: failed move leaves the session where it was
                    prop_assert!(before.room.exit(direction).is_none());
                    prop_assert_eq!(registry.get(1).unwrap(), before);
                },
            }
            prop_assert!(world.contains(registry.get(1).unwrap().room_id()));
        }
    });
}

#[test]
fn prop_sync_actions_mirror_registry_occupancy() {
    proptest!(|(
        walks in prop::collection::vec(prop::collection::vec(direction(), 0..16), 1..6),
        leavers in prop::collection::vec(any::<bool>(), 6),
    )| {
        let world = world();
        let registry = SessionRegistry::new(Arc::clone(&world));
        let mut actions = Vec::new();

        for (id, walk) in walks.iter().enumerate() {
            let id = id as u64;
            let session = registry.create(id, format!("char_{id}")).unwrap();
            actions.push(session.started_action());

            for direction in walk {
                let reply = dispatch(&registry, id, &Command::Go(*direction));
                actions.extend(reply.actions);
            }
        }

        for (id, leaves) in leavers.iter().enumerate().take(walks.len()) {
            if *leaves {
                let session = registry.remove(id as u64).unwrap();
                actions.push(session.ended_action());
            }
        }

        let counts = replay(&actions);
        for room in world.rooms() {
            let expected = registry.occupants(&room.id) as i64;
            prop_assert_eq!(counts.get(&room.id).copied().unwrap_or(0), expected);
        }
    });
}

#[test]
fn prop_same_walk_is_deterministic() {
    proptest!(|(steps in prop::collection::vec(direction(), 0..32))| {
        let run = || {
            let registry = SessionRegistry::new(world());
            registry.create(1, "hero");
            steps
                .iter()
                .map(|d| dispatch(&registry, 1, &Command::Go(*d)).text)
                .collect::<Vec<_>>()
        };

        prop_assert_eq!(run(), run());
    });
}
