//! Game layer for Sluice.
//!
//! Implements the board rules:
//! - Grid of cells joined by gates, with geysers producing force
//! - Gate commands and their merge into the topology
//! - Momentum-capped force flow between cells
//! - Power-law combat on contested cells
//! - The tick pipeline and its invariants

mod combat;
mod command;
mod flow;
mod gate;
mod geyser;
mod grid;
mod invariants;
mod merge;
mod player;
mod state;

pub use combat::{
    combat_index, resolve_combat, resolve_contest, CombatForces, CombatResult, Contestant,
    Skirmish,
};
pub use command::{
    check_submission, format_commands, parse_commands, validate_commands, Command, CommandError,
    SubmitError,
};
pub use flow::{equilibrate, Equilibrium};
pub use gate::{
    directed_flow, placeholder_momentum, GateKey, Gates, MomentumInit, MomentumSeed, NetFlow,
    Pressure, DEFAULT_INITIAL_MOMENTUM,
};
pub use geyser::{Geysers, Tier};
pub use grid::{
    Cell, Coord, Direction, GateError, Grid, LocationError, MAX_COLS, MAX_QUANTITY, MAX_ROWS,
};
pub use invariants::{assert_invariants, check_invariants, InvariantViolation};
pub use merge::{merge_commands, MergeReport};
pub use player::{Player, PlayerId, MAX_PLAYERS};
pub use state::{Board, GameState, TickOutcome, TickSummary};
