//! Tick execution.
//!
//! [`run_tick`] plays one tick of one game end to end: load, validate,
//! merge, flow, combat, check, commit, notify. [`run_due_ticks`] sweeps
//! every game and ticks the ones whose slot has passed, in parallel with
//! rayon. A game that fails is logged and skipped; it does not hold up the
//! others.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{error, info, info_span, warn};

use crate::config::SimConfig;
use crate::game::{check_invariants, CommandError, GameState, InvariantViolation, PlayerId, TickOutcome};
use crate::lobby::{GameRecord, GameStatus};
use crate::notation::NotationError;
use crate::report::tick_report;
use crate::schedule::ScheduleError;
use crate::store::{GameStore, Notice, Notifier, StoreError, TickCommit};

/// Error that stopped a tick. Nothing is stored when one occurs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TickError {
    /// The game is not running.
    #[error("game {0} is not in progress")]
    NotInProgress(String),
    /// Stored board is corrupt.
    #[error("stored board is corrupt: {0}")]
    Notation(#[from] NotationError),
    /// A stored submission no longer parses.
    #[error("stored commands for player {player} are unreadable ({} errors)", .errors.len())]
    Commands {
        /// Seat whose submission is bad.
        player: PlayerId,
        /// Parse errors.
        errors: Vec<CommandError>,
    },
    /// The stored board breaks an invariant before the tick runs.
    #[error("stored board breaks {} invariant(s)", .0.len())]
    Corrupt(Vec<InvariantViolation>),
    /// The engine produced an impossible board.
    #[error("tick broke {} board invariant(s)", .0.len())]
    Invariant(Vec<InvariantViolation>),
    /// Loading or committing failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Schedule settings are bad.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Result of ticking one game during a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepEntry {
    /// Game id.
    pub id: String,
    /// What happened.
    pub result: Result<u32, TickError>,
}

/// Play one tick of game `id` at `now`.
///
/// The new board is committed only if every invariant holds. Players are
/// notified after the commit; a failed notice is logged but does not undo
/// the tick.
///
/// # Errors
///
/// Returns a [`TickError`] if the game cannot be loaded or is not running,
/// if the stored or the new board breaks an invariant, or if the commit
/// fails.
pub fn run_tick(
    store: &dyn GameStore,
    notifier: &dyn Notifier,
    id: &str,
    config: &SimConfig,
    now: DateTime<Utc>,
) -> Result<TickOutcome, TickError> {
    let span = info_span!("tick", game = %id);
    let _enter = span.enter();

    let record = store.load(id)?;
    if record.status != GameStatus::InProgress {
        return Err(TickError::NotInProgress(id.to_string()));
    }
    let submissions = record
        .pending_commands()
        .map_err(|(player, errors)| TickError::Commands { player, errors })?;
    let mut state = record.load_state()?;
    let base_tick = state.tick;

    let stored = check_invariants(&state, config);
    if !stored.is_empty() {
        for violation in &stored {
            error!("Stored {violation}");
        }
        return Err(TickError::Corrupt(stored));
    }

    let outcome = state.advance(&submissions, config);

    let violations = check_invariants(&state, config);
    if !violations.is_empty() {
        for violation in &violations {
            error!("{violation}");
        }
        return Err(TickError::Invariant(violations));
    }

    store.commit_tick(
        id,
        &TickCommit {
            base_tick,
            state: state.clone(),
            game_over: outcome.game_over,
            winner: outcome.winner,
            consumed: record.pending.clone(),
            at: now,
        },
    )?;
    info!(
        tick = outcome.tick,
        opened = outcome.summary.merge.opened.len(),
        closed = outcome.summary.merge.closed.len(),
        skirmishes = outcome.summary.skirmishes.len(),
        "Tick committed"
    );
    if outcome.game_over {
        info!(winner = ?outcome.winner, "Game over");
    }

    notify_players(notifier, &record, &state, &outcome);
    Ok(outcome)
}

/// Send each player who started the tick alive their report.
fn notify_players(
    notifier: &dyn Notifier,
    record: &GameRecord,
    state: &GameState,
    outcome: &TickOutcome,
) {
    let subject = if outcome.game_over {
        format!("[{}] Tick {} - game over", record.id, outcome.tick)
    } else {
        format!("[{}] Tick {}", record.id, outcome.tick)
    };
    let recipients = state
        .players
        .iter()
        .filter(|p| p.alive() || outcome.eliminated.contains(&p.id));
    for player in recipients {
        let notice = Notice {
            to: player.address.clone(),
            subject: subject.clone(),
            body: tick_report(state, outcome, Some(player.id)),
        };
        if let Err(e) = notifier.notify(&notice) {
            warn!("{e}");
        }
    }
}

/// Whether game `id` should tick at `now`.
fn due(store: &dyn GameStore, id: &str, now: DateTime<Utc>) -> Result<bool, TickError> {
    let record = store.load(id)?;
    Ok(record.status == GameStatus::InProgress && record.is_due(now)?)
}

/// Tick every in-progress game whose next slot is at or before `now`.
///
/// Each due game ticks once. Games that are not due are left out of the
/// result; failures are logged and reported per game.
///
/// # Errors
///
/// Returns a [`StoreError`] only if the list of games cannot be read.
pub fn run_due_ticks(
    store: &dyn GameStore,
    notifier: &dyn Notifier,
    config: &SimConfig,
    now: DateTime<Utc>,
) -> Result<Vec<SweepEntry>, StoreError> {
    let ids = store.list()?;

    let entries: Vec<SweepEntry> = ids
        .par_iter()
        .filter_map(|id| {
            let result = match due(store, id, now) {
                Ok(false) => return None,
                Ok(true) => run_tick(store, notifier, id, config, now).map(|o| o.tick),
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                error!(game = %id, "Tick failed: {e}");
            }
            Some(SweepEntry {
                id: id.clone(),
                result,
            })
        })
        .collect();

    info!(
        games = ids.len(),
        ticked = entries.iter().filter(|e| e.result.is_ok()).count(),
        failed = entries.iter().filter(|e| e.result.is_err()).count(),
        "Sweep finished"
    );
    Ok(entries)
}
