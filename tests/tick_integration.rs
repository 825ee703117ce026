//! Multi-tick integration tests for the game lifecycle.
//!
//! These tests drive games through the file store and the runner the way
//! the periodic trigger does, checking that boards stay legal and that
//! submissions are consumed exactly once.
//!
//! Run with: cargo test --release tick_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Utc};
use sluice::game::{check_invariants, format_commands, Command, Direction, GateKey};
use sluice::store::MailboxNotifier;
use sluice::{
    run_due_ticks, FileStore, GameRecord, GameSettings, GameStatus, GameStore, MemoryStore,
    PlayerId, SimConfig,
};

fn at(text: &str) -> DateTime<Utc> {
    text.parse().unwrap()
}

fn start_game(store: &dyn GameStore, id: &str, settings: GameSettings, now: DateTime<Utc>) {
    let config = SimConfig::default();
    let mut record = GameRecord::new(id, settings, now).unwrap();
    store.create(&record).unwrap();
    for address in ["ann@example.org", "bo@example.org"] {
        record = store
            .modify(id, &mut |r| r.join(address, now, &config).map(|_| ()))
            .unwrap();
    }
    assert_eq!(record.status, GameStatus::InProgress);
}

/// Open every closed gate `player` may open, up to the command limit.
fn expansion_orders(record: &GameRecord, player: PlayerId) -> String {
    let state = record.load_state().unwrap();
    let grid = &state.board.grid;
    let mut commands = Vec::new();
    for (coord, cell) in grid.cells_owned_by(player) {
        for dir in Direction::ALL {
            let open_target = GateKey::new(coord, dir)
                .target(grid)
                .and_then(|t| grid.get(t))
                .is_some_and(|t| !t.obstacle);
            let duplicate = commands.iter().any(|c: &Command| {
                c.key().canonical(grid) == GateKey::new(coord, dir).canonical(grid)
            });
            if open_target && !cell.gate(dir) && !duplicate {
                commands.push(Command::new(coord, dir, true));
            }
        }
    }
    commands.truncate(record.settings.command_limit);
    format_commands(&commands)
}

#[test]
fn test_game_runs_on_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let mailbox = MailboxNotifier::new();
    let config = SimConfig::default();

    let settings = GameSettings {
        ticks_per_day: 4,
        timezone: "Europe/Berlin".to_string(),
        rows: 8,
        cols: 8,
        seed: 11,
        ..GameSettings::default()
    };
    start_game(&store, "duel", settings, at("2026-03-01T12:00:00Z"));

    let mut played = 0;
    for _ in 0..24 {
        let record = store.load("duel").unwrap();
        if record.status == GameStatus::Complete {
            break;
        }
        for (address, seat) in [("ann@example.org", 1), ("bo@example.org", 2)] {
            if !record.players.iter().any(|p| p.id == seat && p.alive()) {
                continue;
            }
            let orders = expansion_orders(&record, seat);
            let (player, canonical) = record.prepare_submission(address, &orders).unwrap();
            store.store_commands("duel", player, &canonical).unwrap();
        }

        let now = record.next_tick().unwrap().unwrap();
        let entries = run_due_ticks(&store, &mailbox, &config, now).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].result, Ok(record.tick + 1));
        played += 1;

        let after = store.load("duel").unwrap();
        assert_eq!(after.last_tick, Some(now));
        assert!(after.pending.is_empty());
        let state = after.load_state().unwrap();
        let violations = check_invariants(&state, &config);
        assert!(violations.is_empty(), "{violations:?}");

        // Nothing is due again until the next slot
        assert!(run_due_ticks(&store, &mailbox, &config, now).unwrap().is_empty());
    }

    let record = store.load("duel").unwrap();
    assert_eq!(record.tick, played);
    let state = record.load_state().unwrap();
    let grown = record
        .players
        .iter()
        .filter(|p| p.alive())
        .all(|p| state.board.grid.territory(p.id) > 1);
    assert!(grown, "players should spread past their homes");

    let notices = mailbox.take();
    assert!(notices.len() >= usize::try_from(played).unwrap());
    assert!(notices.iter().all(|n| n.subject.starts_with("[duel] Tick ")));
}

#[test]
fn test_rejected_submission_keeps_previous_orders() {
    let store = MemoryStore::new();
    let now = at("2026-01-10T09:00:00Z");
    start_game(&store, "g", GameSettings::default(), now);

    let record = store.load("g").unwrap();
    let orders = expansion_orders(&record, 1);
    let (seat, canonical) = record.prepare_submission("ann@example.org", &orders).unwrap();
    store.store_commands("g", seat, &canonical).unwrap();

    // Bo's home is not Ann's to close
    let state = record.load_state().unwrap();
    let (bo_home, _) = state.board.grid.cells_owned_by(2).next().unwrap();
    let bad = format!("{orders}\nCLOSE {bo_home}N,{bo_home}S");
    assert!(record.prepare_submission("ann@example.org", &bad).is_err());

    assert_eq!(store.load("g").unwrap().pending.get(&1), Some(&canonical));
}

#[test]
fn test_games_tick_independently() {
    let store = MemoryStore::new();
    let mailbox = MailboxNotifier::new();
    let config = SimConfig::default();

    let daily = GameSettings {
        ticks_per_day: 1,
        seed: 5,
        ..GameSettings::default()
    };
    let frequent = GameSettings {
        ticks_per_day: 4,
        seed: 6,
        ..GameSettings::default()
    };
    start_game(&store, "daily", daily, at("2026-01-10T09:00:00Z"));
    start_game(&store, "frequent", frequent, at("2026-01-10T09:00:00Z"));

    // 14:00 UTC: only the four-a-day game has a slot
    let entries = run_due_ticks(&store, &mailbox, &config, at("2026-01-10T14:00:00Z")).unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["frequent"]);

    // 20:00 UTC: both
    let entries = run_due_ticks(&store, &mailbox, &config, at("2026-01-10T20:00:00Z")).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.result.is_ok()));
    assert_eq!(store.load("daily").unwrap().tick, 1);
    assert_eq!(store.load("frequent").unwrap().tick, 2);
}
