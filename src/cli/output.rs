//! Output formatting utilities for CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sluice::game::GameState;
use sluice::lobby::{GameRecord, GameStatus};
use sluice::report::render_board;
use sluice::{GateKey, PlayerId, TickOutcome};

/// JSON-serializable game overview.
#[derive(Debug, Serialize)]
pub(super) struct JsonGame {
    /// Game id.
    id: String,
    /// Lifecycle state.
    status: GameStatus,
    /// Ticks played.
    tick: u32,
    /// Seats filled / required.
    seats: (usize, usize),
    /// Next scheduled tick (null unless in progress).
    next_tick: Option<DateTime<Utc>>,
    /// Winner once complete.
    winner: Option<PlayerId>,
    /// Players with a pending submission.
    submitted: Vec<PlayerId>,
    /// Per-player standing.
    players: Vec<JsonPlayer>,
}

/// JSON-serializable player standing.
#[derive(Debug, Serialize)]
pub(super) struct JsonPlayer {
    /// Seat number.
    id: PlayerId,
    /// Address.
    address: String,
    /// Cells held.
    cells: usize,
    /// Total force held.
    force: u64,
    /// Tick eliminated (null if still playing).
    eliminated_tick: Option<u32>,
}

impl JsonGame {
    /// Create from a stored game and its decoded state.
    pub(super) fn new(
        record: &GameRecord,
        state: Option<&GameState>,
        next_tick: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status,
            tick: record.tick,
            seats: (record.players.len(), record.settings.required_players),
            next_tick,
            winner: record.winner,
            submitted: record.pending.keys().copied().collect(),
            players: record
                .players
                .iter()
                .map(|p| JsonPlayer {
                    id: p.id,
                    address: p.address.clone(),
                    cells: state.map_or(0, |s| s.board.grid.territory(p.id)),
                    force: state.map_or(0, |s| s.board.grid.total_force(p.id)),
                    eliminated_tick: p.eliminated_tick,
                })
                .collect(),
        }
    }
}

/// JSON-serializable result of ticking one game.
#[derive(Debug, Serialize)]
pub(super) struct JsonTick {
    /// Game id.
    id: String,
    /// Tick played (null on failure).
    tick: Option<u32>,
    /// Failure message.
    error: Option<String>,
    /// Gates opened by the merge.
    opened: Vec<String>,
    /// Gates closed by the merge.
    closed: Vec<String>,
    /// Gates left unchanged by conflicting commands.
    conflicts: Vec<String>,
    /// Players eliminated this tick.
    eliminated: Vec<PlayerId>,
    /// Winner if the game ended.
    winner: Option<PlayerId>,
    /// Whether the game ended.
    game_over: bool,
}

impl JsonTick {
    /// Create from a tick outcome.
    pub(super) fn from_outcome(id: &str, outcome: &TickOutcome) -> Self {
        let names = |keys: &[GateKey]| -> Vec<String> { keys.iter().map(ToString::to_string).collect() };
        let merge = &outcome.summary.merge;
        Self {
            id: id.to_string(),
            tick: Some(outcome.tick),
            error: None,
            opened: names(&merge.opened),
            closed: names(&merge.closed),
            conflicts: names(&merge.conflicts),
            eliminated: outcome.eliminated.clone(),
            winner: outcome.winner,
            game_over: outcome.game_over,
        }
    }

    /// A tick that ran during a sweep, identified only by its number.
    pub(super) fn swept(id: &str, result: Result<u32, String>) -> Self {
        let (tick, error) = match result {
            Ok(tick) => (Some(tick), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            id: id.to_string(),
            tick,
            error,
            opened: Vec::new(),
            closed: Vec::new(),
            conflicts: Vec::new(),
            eliminated: Vec::new(),
            winner: None,
            game_over: false,
        }
    }
}

/// Format a game overview as human-readable text.
pub(super) fn format_game(
    record: &GameRecord,
    state: Option<&GameState>,
    next_tick: Option<DateTime<Utc>>,
) -> String {
    let mut output = String::new();

    let status = match record.status {
        GameStatus::Open => "open",
        GameStatus::InProgress => "in progress",
        GameStatus::Complete => "complete",
    };
    output.push_str(&format!("Game {} ({status})\n", record.id));
    output.push_str(&format!(
        "  Seats: {}/{}\n",
        record.players.len(),
        record.settings.required_players
    ));
    output.push_str(&format!(
        "  Ticks: {} played, {} per day ({})\n",
        record.tick, record.settings.ticks_per_day, record.settings.timezone
    ));
    if let Some(next) = next_tick {
        output.push_str(&format!("  Next tick: {}\n", next.to_rfc3339()));
    }
    if let Some(winner) = record.winner {
        output.push_str(&format!("  Winner: Player {winner}\n"));
    }
    output.push('\n');

    for player in &record.players {
        output.push_str(&format!("  Player {}: {}", player.id, player.address));
        if let Some(state) = state {
            output.push_str(&format!(
                " - {} cells, {} force",
                state.board.grid.territory(player.id),
                state.board.grid.total_force(player.id)
            ));
        }
        if record.pending.contains_key(&player.id) {
            output.push_str(" [submitted]");
        }
        if let Some(tick) = player.eliminated_tick {
            output.push_str(&format!(" [eliminated tick {tick}]"));
        }
        output.push('\n');
    }

    if let Some(state) = state {
        output.push('\n');
        output.push_str(&render_board(&state.board));
    }

    output
}
