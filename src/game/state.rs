//! Board state and the per-tick pipeline.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::game::{
    equilibrate, merge_commands, resolve_combat, Command, GateError, GateKey, Gates, Geysers,
    Grid, MergeReport, NetFlow, Player, PlayerId, Pressure, Skirmish,
};

/// Everything persisted about the playing field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Cells and gate topology.
    pub grid: Grid,
    /// Geyser placement.
    pub geysers: Geysers,
    /// Momentum of every open directed gate.
    pub gates: Gates,
    /// Inbound flow per cell during the last tick.
    pub pressure: Pressure,
}

/// What happened to the board during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    /// Gate changes from the merged commands.
    pub merge: MergeReport,
    /// Force added by geysers.
    pub produced: u64,
    /// Equilibration passes that moved force.
    pub active_iterations: u32,
    /// Net flow per gate.
    pub flow: NetFlow,
    /// Contested cells and how they were settled.
    pub skirmishes: Vec<Skirmish>,
}

impl Board {
    /// A board over `grid` with no geysers and all gates closed.
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        let pressure = Pressure::zeroed(&grid);
        Self {
            grid,
            geysers: Geysers::new(),
            gates: Gates::new(),
            pressure,
        }
    }

    /// Open a gate outside of command merging, seeding its momentum.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`] if the gate leads off the grid or touches an
    /// obstacle.
    pub fn force_open(&mut self, key: GateKey, config: &SimConfig) -> Result<bool, GateError> {
        let changed = self.grid.set_gate(key.coord, key.dir, true)?;
        if changed {
            self.gates.open(&self.grid, &self.pressure, key, config);
        }
        Ok(changed)
    }

    /// Run one tick: merge commands, equilibrate, fight, then adapt
    /// momentum and pressure to the observed flow.
    pub fn tick(
        &mut self,
        submissions: &BTreeMap<PlayerId, Vec<Command>>,
        config: &SimConfig,
    ) -> TickSummary {
        let defenders: Vec<Option<PlayerId>> =
            self.grid.cells().iter().map(|cell| cell.owner).collect();

        let merge = merge_commands(
            &mut self.grid,
            &mut self.gates,
            &self.pressure,
            submissions,
            config,
        );
        let equilibrium = equilibrate(&mut self.grid, &self.gates, &self.geysers, config);
        let skirmishes = resolve_combat(&mut self.grid, equilibrium.forces, &defenders, config);

        self.gates.apply_flow(&self.grid, &equilibrium.flow, config);
        self.pressure = Pressure::from_flows(&self.grid, equilibrium.owner_flow.values());

        TickSummary {
            merge,
            produced: equilibrium.produced,
            active_iterations: equilibrium.active_iterations,
            flow: equilibrium.flow,
            skirmishes,
        }
    }

    /// Players that still hold at least one cell, in seat order.
    #[must_use]
    pub fn holders(&self) -> Vec<PlayerId> {
        let mut holders: Vec<PlayerId> = self.grid.iter().filter_map(|(_, c)| c.owner).collect();
        holders.sort_unstable();
        holders.dedup();
        holders
    }
}

/// Outcome of advancing a game by one tick.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Tick number just played (1-based).
    pub tick: u32,
    /// Board-level results.
    pub summary: TickSummary,
    /// Players knocked out this tick.
    pub eliminated: Vec<PlayerId>,
    /// Whether the game ended this tick.
    pub game_over: bool,
    /// Sole remaining player once the game is over.
    pub winner: Option<PlayerId>,
}

/// A board together with the players contesting it.
#[derive(Debug, Clone)]
pub struct GameState {
    /// The playing field.
    pub board: Board,
    /// Seated players.
    pub players: Vec<Player>,
    /// Ticks played so far.
    pub tick: u32,
}

impl GameState {
    /// Create a game state.
    #[must_use]
    pub fn new(board: Board, players: Vec<Player>, tick: u32) -> Self {
        Self {
            board,
            players,
            tick,
        }
    }

    /// Get a player by ID.
    #[must_use]
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Players still in the game.
    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive())
    }

    /// Whether at most one player is left.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.alive_players().count() <= 1
    }

    /// Play one tick.
    ///
    /// Commands from eliminated players are ignored. After combat, anyone
    /// left without a cell is eliminated.
    pub fn advance(
        &mut self,
        submissions: &BTreeMap<PlayerId, Vec<Command>>,
        config: &SimConfig,
    ) -> TickOutcome {
        let live: BTreeMap<PlayerId, Vec<Command>> = submissions
            .iter()
            .filter(|(id, _)| self.get_player(**id).is_some_and(Player::alive))
            .map(|(id, commands)| (*id, commands.clone()))
            .collect();

        self.tick += 1;
        let summary = self.board.tick(&live, config);
        let eliminated = self.check_eliminations();
        let game_over = self.is_game_over();
        let winner = if game_over {
            self.alive_players().next().map(|p| p.id)
        } else {
            None
        };

        TickOutcome {
            tick: self.tick,
            summary,
            eliminated,
            game_over,
            winner,
        }
    }

    /// Eliminate every living player that holds no cell.
    pub fn check_eliminations(&mut self) -> Vec<PlayerId> {
        let holders = self.board.holders();
        let mut eliminated = Vec::new();
        for player in &mut self.players {
            if player.alive() && holders.binary_search(&player.id).is_err() {
                player.eliminate(self.tick);
                eliminated.push(player.id);
            }
        }
        eliminated
    }
}
