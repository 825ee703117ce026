// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Sluice: a tick-based territory engine for play-by-mail games.
//!
//! Players hold cells on a grid and steer force between them by opening
//! and closing the gates on shared edges. Once per scheduled tick the
//! engine:
//! - merges everyone's gate commands
//! - lets force flow through open gates, limited by each gate's momentum
//! - resolves combat wherever several owners meet
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   CLI / periodic trigger (runner)   │
//! ├─────────────────────────────────────┤
//! │  Lobby, schedule, store, reports    │
//! ├─────────────────────────────────────┤
//! │  Game core: merge → flow → combat   │
//! └─────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod notation;
pub mod report;
pub mod runner;
pub mod schedule;
pub mod store;

pub use config::SimConfig;
pub use error::{Error, Result};

// Re-export key game types at crate root for convenience
pub use game::{
    Board, Cell, Command, Coord, Direction, GameState, GateKey, Grid, Player, PlayerId,
    TickOutcome,
};
pub use lobby::{GameRecord, GameSettings, GameStatus};
pub use runner::{run_due_ticks, run_tick, TickError};
pub use store::{FileStore, GameStore, MemoryStore, Notifier};
