//! Directed gates, their momentum, and last tick's pressure.
//!
//! Every open gate is tracked as two directed [`GateKey`]s (A→B and its
//! mirror B→A). Each carries its own momentum: the amount of force one owner
//! may move through it during a single tick.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::SimConfig;
use crate::game::{Coord, Direction, Grid};

/// Momentum given to new gates by [`placeholder_momentum`].
pub const DEFAULT_INITIAL_MOMENTUM: u32 = 200;

/// A directed gate: the side of `coord` facing `dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GateKey {
    /// Cell the gate is read from.
    pub coord: Coord,
    /// Side of the cell.
    pub dir: Direction,
}

impl GateKey {
    /// Create a new gate key.
    #[must_use]
    pub const fn new(coord: Coord, dir: Direction) -> Self {
        Self { coord, dir }
    }

    /// The same gate seen from the neighboring cell.
    #[must_use]
    pub fn mirror(self, grid: &Grid) -> Option<GateKey> {
        grid.neighbor(self.coord, self.dir)
            .map(|n| GateKey::new(n, self.dir.opposite()))
    }

    /// The cell this gate leads to.
    #[must_use]
    pub fn target(self, grid: &Grid) -> Option<Coord> {
        grid.neighbor(self.coord, self.dir)
    }

    /// The East/South-facing form of this gate, and whether `self` already is.
    ///
    /// Both mirrored keys of one gate map to the same canonical key.
    #[must_use]
    pub fn canonical(self, grid: &Grid) -> Option<(GateKey, bool)> {
        match self.dir {
            Direction::East | Direction::South => Some((self, true)),
            Direction::North | Direction::West => self.mirror(grid).map(|m| (m, false)),
        }
    }
}

impl fmt::Display for GateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.coord, self.dir)
    }
}

/// Inputs available to a momentum initializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumSeed {
    /// Quantity in the cell the directed gate leaves from.
    pub quantity: u32,
    /// That cell's inbound flow during the previous tick.
    pub pressure: u32,
}

/// Computes the starting momentum of a newly opened directed gate.
pub type MomentumInit = fn(MomentumSeed) -> u32;

/// Default initializer: a fixed momentum regardless of the seed.
///
/// This is a stand-in until a quantity/pressure formula is chosen; swap it
/// through [`SimConfig::momentum_init`].
#[must_use]
pub fn placeholder_momentum(_seed: MomentumSeed) -> u32 {
    DEFAULT_INITIAL_MOMENTUM
}

/// Net force moved through each gate during a tick, summed over owners.
///
/// Keyed by canonical gate; positive values flow East/South.
pub type NetFlow = BTreeMap<GateKey, i64>;

/// Flow through a directed gate: positive if force moved along `key`.
#[must_use]
pub fn directed_flow(flow: &NetFlow, grid: &Grid, key: GateKey) -> i64 {
    match key.canonical(grid) {
        Some((canonical, true)) => flow.get(&canonical).copied().unwrap_or(0),
        Some((canonical, false)) => -flow.get(&canonical).copied().unwrap_or(0),
        None => 0,
    }
}

/// Per-cell inbound flow of the previous tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pressure {
    cols: u16,
    values: Vec<u32>,
}

impl Pressure {
    /// All-zero pressure for a grid.
    #[must_use]
    pub fn zeroed(grid: &Grid) -> Self {
        Self {
            cols: grid.cols(),
            values: vec![0; grid.cells().len()],
        }
    }

    /// Build from rows of values. Returns `None` if rows are ragged or empty.
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Option<Self> {
        let cols = rows.first()?.len();
        if cols == 0 || rows.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self {
            cols: u16::try_from(cols).ok()?,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let rows = (self.values.len() / usize::from(self.cols.max(1))) as u16;
        rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// Pressure at `coord` (0 if off the grid).
    #[must_use]
    pub fn get(&self, coord: Coord) -> u32 {
        if coord.col >= self.cols {
            return 0;
        }
        let idx = usize::from(coord.row) * usize::from(self.cols) + usize::from(coord.col);
        self.values.get(idx).copied().unwrap_or(0)
    }

    /// Values of one row.
    pub fn row(&self, row: u16) -> impl Iterator<Item = u32> + '_ {
        let start = usize::from(row) * usize::from(self.cols);
        self.values
            .get(start..start + usize::from(self.cols))
            .unwrap_or_default()
            .iter()
            .copied()
    }

    /// Sum the inbound flow of every cell from per-owner flows.
    ///
    /// Each owner's flow counts on its own, so two owners pushing through
    /// the same gate in opposite directions both add to the pressure.
    #[must_use]
    pub fn from_flows<'a>(grid: &Grid, flows: impl IntoIterator<Item = &'a NetFlow>) -> Self {
        let mut pressure = Self::zeroed(grid);
        for (key, &amount) in flows.into_iter().flatten() {
            let (into, magnitude) = if amount >= 0 {
                (key.target(grid), amount)
            } else {
                (Some(key.coord), -amount)
            };
            if let Some(coord) = into {
                let idx = usize::from(coord.row) * usize::from(pressure.cols) + usize::from(coord.col);
                let add = u32::try_from(magnitude).unwrap_or(u32::MAX);
                pressure.values[idx] = pressure.values[idx].saturating_add(add);
            }
        }
        pressure
    }
}

/// Momentum of every open directed gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gates {
    momentum: BTreeMap<GateKey, u32>,
}

impl Gates {
    /// No open gates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Momentum of a directed gate, if it is tracked.
    #[must_use]
    pub fn momentum(&self, key: GateKey) -> Option<u32> {
        self.momentum.get(&key).copied()
    }

    /// Overwrite the momentum of a directed gate.
    pub fn set_momentum(&mut self, key: GateKey, value: u32) {
        self.momentum.insert(key, value);
    }

    /// Iterate directed gates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (GateKey, u32)> + '_ {
        self.momentum.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of tracked directed gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.momentum.len()
    }

    /// Whether no gates are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.momentum.is_empty()
    }

    /// Seed both directions of a freshly opened gate.
    ///
    /// Each direction is initialized from the cell it leaves.
    pub fn open(&mut self, grid: &Grid, pressure: &Pressure, key: GateKey, config: &SimConfig) {
        let Some(mirror) = key.mirror(grid) else {
            return;
        };
        for directed in [key, mirror] {
            let quantity = grid.get(directed.coord).map_or(0, |c| c.quantity);
            let seed = MomentumSeed {
                quantity,
                pressure: pressure.get(directed.coord),
            };
            let value = config.clamp_momentum((config.momentum_init)(seed));
            self.momentum.insert(directed, value);
        }
    }

    /// Forget both directions of a closed gate.
    pub fn close(&mut self, grid: &Grid, key: GateKey) {
        self.momentum.remove(&key);
        if let Some(mirror) = key.mirror(grid) {
            self.momentum.remove(&mirror);
        }
    }

    /// Adapt every momentum to the flow observed during the tick.
    ///
    /// Heavy use grows momentum; otherwise it decays, faster when the
    /// force went against the gate's direction.
    pub fn apply_flow(&mut self, grid: &Grid, flow: &NetFlow, config: &SimConfig) {
        for (key, momentum) in &mut self.momentum {
            let moved = directed_flow(flow, grid, *key);
            let heavy = moved > 0
                && moved.saturating_mul(100)
                    >= i64::from(*momentum) * i64::from(config.heavy_use_percent);
            let next = if heavy {
                momentum.saturating_add(config.momentum_growth)
            } else if moved < 0 {
                momentum.saturating_sub(config.reversal_decay)
            } else {
                momentum.saturating_sub(config.momentum_decay)
            };
            *momentum = config.clamp_momentum(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cells() -> Grid {
        let mut grid = Grid::new(1, 2).unwrap();
        grid.set_gate(Coord::new(0, 0), Direction::East, true).unwrap();
        grid
    }

    #[test]
    fn test_mirror_and_canonical() {
        let grid = two_cells();
        let east = GateKey::new(Coord::new(0, 0), Direction::East);
        let west = GateKey::new(Coord::new(0, 1), Direction::West);
        assert_eq!(east.mirror(&grid), Some(west));
        assert_eq!(east.canonical(&grid), Some((east, true)));
        assert_eq!(west.canonical(&grid), Some((east, false)));
        assert_eq!(east.to_string(), "A1E");
    }

    #[test]
    fn test_open_seeds_both_directions() {
        let grid = two_cells();
        let pressure = Pressure::zeroed(&grid);
        let config = SimConfig::default();
        let mut gates = Gates::new();
        let key = GateKey::new(Coord::new(0, 0), Direction::East);

        gates.open(&grid, &pressure, key, &config);
        assert_eq!(gates.len(), 2);
        assert_eq!(gates.momentum(key), Some(DEFAULT_INITIAL_MOMENTUM));
        assert_eq!(
            gates.momentum(GateKey::new(Coord::new(0, 1), Direction::West)),
            Some(DEFAULT_INITIAL_MOMENTUM)
        );

        gates.close(&grid, GateKey::new(Coord::new(0, 1), Direction::West));
        assert!(gates.is_empty());
    }

    #[test]
    fn test_custom_initializer_is_clamped() {
        fn from_quantity(seed: MomentumSeed) -> u32 {
            seed.quantity * 10
        }
        let mut grid = two_cells();
        grid.get_mut(Coord::new(0, 0)).unwrap().quantity = 300;
        let config = SimConfig {
            momentum_init: from_quantity,
            ..SimConfig::default()
        };
        let mut gates = Gates::new();
        let key = GateKey::new(Coord::new(0, 0), Direction::East);
        gates.open(&grid, &Pressure::zeroed(&grid), key, &config);

        assert_eq!(gates.momentum(key), Some(config.momentum_ceiling));
        // Empty side seeds to zero and is lifted to the floor
        assert_eq!(gates.momentum(key.mirror(&grid).unwrap()), Some(config.momentum_floor));
    }

    #[test]
    fn test_apply_flow_growth_and_decay() {
        let grid = two_cells();
        let config = SimConfig::default();
        let east = GateKey::new(Coord::new(0, 0), Direction::East);
        let west = east.mirror(&grid).unwrap();
        let mut gates = Gates::new();
        gates.set_momentum(east, 400);
        gates.set_momentum(west, 400);

        let mut flow = NetFlow::new();
        flow.insert(east, 300);
        gates.apply_flow(&grid, &flow, &config);

        assert_eq!(gates.momentum(east), Some(450));
        assert_eq!(gates.momentum(west), Some(300));

        gates.apply_flow(&grid, &NetFlow::new(), &config);
        assert_eq!(gates.momentum(east), Some(425));
        assert_eq!(gates.momentum(west), Some(275));
    }

    #[test]
    fn test_pressure_from_flow() {
        let grid = two_cells();
        let east = GateKey::new(Coord::new(0, 0), Direction::East);
        let mut flow = NetFlow::new();
        flow.insert(east, -120);
        let pressure = Pressure::from_flows(&grid, [&flow]);
        assert_eq!(pressure.get(Coord::new(0, 0)), 120);
        assert_eq!(pressure.get(Coord::new(0, 1)), 0);
    }

    #[test]
    fn test_opposing_owners_both_add_pressure() {
        let grid = two_cells();
        let east = GateKey::new(Coord::new(0, 0), Direction::East);
        let mut pushing_east = NetFlow::new();
        pushing_east.insert(east, 80);
        let mut pushing_west = NetFlow::new();
        pushing_west.insert(east, -80);

        let pressure = Pressure::from_flows(&grid, [&pushing_east, &pushing_west]);
        assert_eq!(pressure.get(Coord::new(0, 0)), 80);
        assert_eq!(pressure.get(Coord::new(0, 1)), 80);
    }

    #[test]
    fn test_pressure_rows_must_be_rectangular() {
        assert!(Pressure::from_rows(vec![vec![1, 2], vec![3]]).is_none());
        assert!(Pressure::from_rows(vec![]).is_none());
        let p = Pressure::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
        assert_eq!(p.rows(), 2);
        assert_eq!(p.get(Coord::new(1, 0)), 3);
    }
}
