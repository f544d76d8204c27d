//! Command parsing and dispatch.
//!
//! One input line becomes one [`Command`]. Dispatch turns a command into a
//! [`Reply`]: the text to send back and any sync actions for the runtime to
//! queue. Dispatch never blocks and never touches storage.

use std::fmt::Write as _;

use crate::{
    action::SyncAction,
    movement::MoveError,
    registry::SessionRegistry,
    world::{Direction, Room},
};

/// Static command summary shown by `help`.
pub const HELP_TEXT: &str = "Available commands:\n\
- help: Show this help message\n\
- look, l: Look around the room\n\
- n/s/e/w/ne/nw/se/sw/u/d or north/south/east/west/northeast/northwest/southeast/southwest/up/down: Move in a direction\n\
- quit/exit: Exit the game\n";

/// Farewell sent before closing on `quit`/`exit`.
pub const FAREWELL: &str = "Goodbye!\n";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line; nothing happens
    Empty,
    /// `help`
    Help,
    /// `look` or `l`
    Look,
    /// A direction word or its abbreviation
    Go(Direction),
    /// `quit` or `exit`
    Quit,
    /// Anything else, trimmed
    Unknown(String),
}

impl Command {
    /// Parse one line.
    ///
    /// Surrounding whitespace is ignored and matching is ASCII
    /// case-insensitive. Abbreviations are normalized before matching.
    pub fn parse(line: &str) -> Self {
        let text = line.trim();
        if text.is_empty() {
            return Self::Empty;
        }

        let word = text.to_ascii_lowercase();
        if let Some(direction) = Direction::from_abbreviation(&word) {
            return Self::Go(direction);
        }
        if let Ok(direction) = word.parse::<Direction>() {
            return Self::Go(direction);
        }

        match word.as_str() {
            "help" => Self::Help,
            "look" | "l" => Self::Look,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(text.to_string()),
        }
    }
}

/// Outcome of dispatching one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Text for the player, `\n`-terminated (may be empty)
    pub text: String,
    /// Durable-state updates to queue
    pub actions: Vec<SyncAction>,
    /// Close the connection after sending `text`
    pub disconnect: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

/// Describe a room the way `look` does.
pub fn describe_room(room: &Room) -> String {
    let mut text = format!("You are in: {}\nSmells: {}\n", room.description, room.smells);
    let exits = room.exit_names();
    if !exits.is_empty() {
        let _ = writeln!(text, "Exits: {}", exits.join(", "));
    }
    text
}

/// Run `command` for `session_id`.
pub fn dispatch(registry: &SessionRegistry, session_id: u64, command: &Command) -> Reply {
    match command {
        Command::Empty => Reply::default(),
        Command::Help => Reply::text(HELP_TEXT),
        Command::Look => match registry.get(session_id) {
            Some(session) => Reply::text(describe_room(&session.room)),
            None => {
                tracing::warn!(session_id, "look for unknown session");
                Reply::default()
            },
        },
        Command::Go(direction) => go(registry, session_id, *direction),
        Command::Quit => Reply { text: FAREWELL.to_string(), actions: Vec::new(), disconnect: true },
        Command::Unknown(text) => Reply::text(format!("Unknown command: {text}\n")),
    }
}

fn go(registry: &SessionRegistry, session_id: u64, direction: Direction) -> Reply {
    match registry.move_session(session_id, direction) {
        Ok(mv) => {
            tracing::debug!(session_id, from = %mv.from.id, to = %mv.to.id, "moved");
            Reply {
                text: format!("You move {direction}.\nYou are now in: {}\n", mv.to.description),
                actions: vec![mv.sync_action()],
                disconnect: false,
            }
        },
        Err(err) => {
            match &err {
                MoveError::NoExit { .. } => tracing::debug!(session_id, %err, "move refused"),
                MoveError::DanglingExit { .. } => {
                    tracing::warn!(session_id, %err, "world integrity: dangling exit");
                },
                MoveError::NoSuchSession(_) => tracing::warn!(session_id, %err, "move failed"),
            }
            Reply::text(format!("You cannot go {direction}.\n"))
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::world::WorldGraph;

    fn registry() -> SessionRegistry {
        let world = WorldGraph::new(
            vec![
                Room::new("start", "A mossy clearing")
                    .with_smells("Pine needles")
                    .with_exit(Direction::Up, "up_room")
                    .with_exit(Direction::East, "e_room"),
                Room::new("up_room", "A branch high in an oak")
                    .with_smells("Bark")
                    .with_exit(Direction::Down, "start"),
                Room::new("e_room", "A quiet stream").with_exit(Direction::West, "start"),
            ],
            "start",
        )
        .unwrap();
        let registry = SessionRegistry::new(Arc::new(world));
        registry.create(1, "hero");
        registry
    }

    #[test]
    fn parse_normalizes_abbreviations() {
        assert_eq!(Command::parse("n"), Command::Go(Direction::North));
        assert_eq!(Command::parse("sw"), Command::Go(Direction::Southwest));
        assert_eq!(Command::parse("u"), Command::Go(Direction::Up));
        assert_eq!(Command::parse("d"), Command::Go(Direction::Down));
        assert_eq!(Command::parse("l"), Command::Look);
        assert_eq!(Command::parse("look"), Command::Look);
        assert_eq!(Command::parse("northeast"), Command::Go(Direction::Northeast));
    }

    #[test]
    fn parse_trims_and_ignores_case() {
        assert_eq!(Command::parse("  HELP \t"), Command::Help);
        assert_eq!(Command::parse("Exit"), Command::Quit);
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("   "), Command::Empty);
    }

    #[test]
    fn parse_keeps_unknown_text() {
        assert_eq!(Command::parse(" dance wildly "), Command::Unknown("dance wildly".to_string()));
    }

    #[test]
    fn empty_line_is_noop() {
        let registry = registry();
        assert_eq!(dispatch(&registry, 1, &Command::Empty), Reply::default());
    }

    #[test]
    fn look_lists_sorted_exits() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::Look);
        assert_eq!(
            reply.text,
            "You are in: A mossy clearing\nSmells: Pine needles\nExits: east, up\n"
        );
        assert!(reply.actions.is_empty());
    }

    #[test]
    fn move_reports_new_room_and_queues_sync() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::parse("u"));

        assert_eq!(reply.text, "You move up.\nYou are now in: A branch high in an oak\n");
        assert_eq!(reply.actions.len(), 1);
        assert!(!reply.disconnect);
    }

    #[test]
    fn blocked_move_reports_direction() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::parse("s"));

        assert_eq!(reply.text, "You cannot go south.\n");
        assert!(reply.actions.is_empty());
        assert_eq!(registry.get(1).unwrap().room_id(), "start");
    }

    #[test]
    fn dangling_exit_reads_as_blocked() {
        let world = WorldGraph::unvalidated(
            vec![Room::new("start", "A mossy clearing").with_exit(Direction::East, "void")],
            "start",
        )
        .unwrap();
        let registry = SessionRegistry::new(Arc::new(world));
        registry.create(1, "hero");

        let reply = dispatch(&registry, 1, &Command::parse("e"));

        assert_eq!(reply.text, "You cannot go east.\n");
        assert!(reply.actions.is_empty());
        assert!(!reply.disconnect);
        assert_eq!(registry.get(1).unwrap().room_id(), "start");
    }

    #[test]
    fn unknown_command_echoes_input() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::parse("xyzzy"));
        assert_eq!(reply.text, "Unknown command: xyzzy\n");
    }

    #[test]
    fn quit_disconnects() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::Quit);
        assert_eq!(reply.text, FAREWELL);
        assert!(reply.disconnect);
    }

    #[test]
    fn help_is_static() {
        let registry = registry();
        let reply = dispatch(&registry, 1, &Command::Help);
        assert!(reply.text.starts_with("Available commands:\n"));
        assert!(reply.text.contains("- quit/exit: Exit the game\n"));
    }
}
