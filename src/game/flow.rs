//! Force equilibration across open gates.
//!
//! A tick runs a bounded number of iterations. In each one, every scheduled
//! unit of force (a cell's resident force, or a pool one owner has pushed
//! into a cell it does not hold) is visited from strongest to weakest, and
//! evens itself out with the weaker neighbors it can reach:
//!
//! ```text
//!   target = round((Q + Σ neighbors) / (n + 1))
//!   neighbor above target  -> pull (neighbor - target) back
//!   neighbor below target  -> push (target - neighbor) out
//! ```
//!
//! Every transfer is capped by what the owner still has left on that
//! directed gate this tick (its momentum minus the owner's net flow through
//! it so far). Transfers are recorded against an owner-scoped working view
//! and only folded into the grid once the whole iteration has been visited.
//! Force that lands in a cell held by someone else is parked in the
//! [`CombatForces`] overlay instead of the grid, so a contested cell never
//! relays force in the iteration it was entered.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use crate::config::SimConfig;
use crate::game::{CombatForces, Coord, Direction, GateKey, Gates, Geysers, Grid, NetFlow, PlayerId};

/// Owner-scoped force at one cell.
type OwnerKey = (Coord, PlayerId);

/// Outcome of equilibrating one tick.
#[derive(Debug, Clone, Default)]
pub struct Equilibrium {
    /// Force left in cells not (yet) held by its owner.
    pub forces: CombatForces,
    /// Net flow per gate, summed over owners.
    pub flow: NetFlow,
    /// Net flow per gate for each owner on its own.
    pub owner_flow: BTreeMap<PlayerId, NetFlow>,
    /// Force added by geysers.
    pub produced: u64,
    /// Iterations that moved at least one unit of force.
    pub active_iterations: u32,
    /// Units visited over all iterations.
    pub units_visited: usize,
}

/// A unit of force waiting to be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Unit {
    quantity: u32,
    coord: Coord,
    owner: PlayerId,
    /// Pools may only move through gates into their owner's own cells.
    pooled: bool,
}

impl Ord for Unit {
    /// Larger quantities first; ties go to the lower row, then the lower
    /// column, then the lower owner id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.quantity
            .cmp(&other.quantity)
            .then_with(|| other.coord.cmp(&self.coord))
            .then_with(|| other.owner.cmp(&self.owner))
            .then_with(|| other.pooled.cmp(&self.pooled))
    }
}

impl PartialOrd for Unit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-owner net flow through each gate during the current tick.
#[derive(Debug, Default)]
struct FlowLedger {
    by_owner: BTreeMap<PlayerId, BTreeMap<GateKey, i64>>,
}

impl FlowLedger {
    /// Net amount `owner` has moved along the directed `key`.
    fn moved(&self, grid: &Grid, owner: PlayerId, key: GateKey) -> i64 {
        let Some((canonical, forward)) = key.canonical(grid) else {
            return 0;
        };
        let net = self
            .by_owner
            .get(&owner)
            .and_then(|gates| gates.get(&canonical))
            .copied()
            .unwrap_or(0);
        if forward { net } else { -net }
    }

    /// What `owner` may still move along `key` this tick.
    fn remaining(&self, grid: &Grid, gates: &Gates, owner: PlayerId, key: GateKey) -> i64 {
        let momentum = i64::from(gates.momentum(key).unwrap_or(0));
        (momentum - self.moved(grid, owner, key)).max(0)
    }

    fn record(&mut self, grid: &Grid, owner: PlayerId, key: GateKey, amount: i64) {
        let Some((canonical, forward)) = key.canonical(grid) else {
            return;
        };
        let entry = self
            .by_owner
            .entry(owner)
            .or_default()
            .entry(canonical)
            .or_insert(0);
        *entry += if forward { amount } else { -amount };
    }

    /// Each owner's nonzero net flow per gate.
    fn owner_flow(&self) -> BTreeMap<PlayerId, NetFlow> {
        self.by_owner
            .iter()
            .map(|(&owner, gates)| {
                let flow: NetFlow = gates
                    .iter()
                    .filter(|&(_, &amount)| amount != 0)
                    .map(|(&key, &amount)| (key, amount))
                    .collect();
                (owner, flow)
            })
            .filter(|(_, flow)| !flow.is_empty())
            .collect()
    }

    /// Net flow per gate over every owner.
    fn net_flow(&self) -> NetFlow {
        let mut flow = NetFlow::new();
        for gates in self.by_owner.values() {
            for (key, amount) in gates {
                *flow.entry(*key).or_insert(0) += amount;
            }
        }
        flow.retain(|_, amount| *amount != 0);
        flow
    }
}

/// A neighbor that holds less of the visiting owner's force.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dir: Direction,
    coord: Coord,
    quantity: i64,
}

/// Mutable state of one tick's equilibration.
struct Solver<'a> {
    grid: &'a mut Grid,
    gates: &'a Gates,
    config: &'a SimConfig,
    forces: CombatForces,
    ledger: FlowLedger,
}

impl Solver<'_> {
    /// Owner-scoped quantities: resident force plus pooled force.
    fn effective_view(&self) -> BTreeMap<OwnerKey, i64> {
        let mut view = BTreeMap::new();
        for (coord, cell) in self.grid.iter() {
            if let Some(owner) = cell.owner {
                view.insert((coord, owner), i64::from(cell.quantity));
            }
        }
        for (coord, owner, force) in self.forces.iter() {
            *view.entry((coord, owner)).or_insert(0) += i64::from(force);
        }
        view
    }

    /// Units living in `cells`, keyed by their quantity at iteration start.
    fn schedule(&self, cells: &BTreeSet<Coord>) -> BinaryHeap<Unit> {
        let mut heap = BinaryHeap::new();
        for &coord in cells {
            let Some(cell) = self.grid.get(coord) else {
                continue;
            };
            if let Some(owner) = cell.owner {
                if cell.quantity > 0 && !cell.obstacle {
                    heap.push(Unit {
                        quantity: cell.quantity,
                        coord,
                        owner,
                        pooled: false,
                    });
                }
            }
            for (owner, force) in self.forces.at(coord) {
                heap.push(Unit {
                    quantity: force,
                    coord,
                    owner,
                    pooled: true,
                });
            }
        }
        heap
    }

    /// Even out one unit with its weaker neighbors. Returns touched cells.
    fn visit(&mut self, unit: Unit, working: &mut BTreeMap<OwnerKey, i64>) -> Vec<Coord> {
        let here = (unit.coord, unit.owner);
        let quantity = working.get(&here).copied().unwrap_or(0);
        if quantity <= 0 {
            return Vec::new();
        }

        let grid = &*self.grid;
        let candidates: Vec<Candidate> = grid
            .open_gates(unit.coord)
            .filter(|(_, n)| {
                !unit.pooled || grid.get(*n).is_some_and(|c| c.owner == Some(unit.owner))
            })
            .map(|(dir, n)| Candidate {
                dir,
                coord: n,
                quantity: working.get(&(n, unit.owner)).copied().unwrap_or(0),
            })
            .filter(|c| c.quantity < quantity)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let total: i64 = quantity + candidates.iter().map(|c| c.quantity).sum::<i64>();
        let shares = i64::try_from(candidates.len()).unwrap_or(i64::MAX) + 1;
        let target = (2 * total + shares) / (2 * shares);

        let mut touched = Vec::new();

        // Pull back from neighbors left above the level first.
        for cand in candidates.iter().filter(|c| c.quantity > target) {
            let back = GateKey::new(cand.coord, cand.dir.opposite());
            let budget = self.ledger.remaining(grid, self.gates, unit.owner, back);
            let available = working.get(&(cand.coord, unit.owner)).copied().unwrap_or(0);
            let amount = (cand.quantity - target).min(budget).min(available);
            if amount > 0 {
                transfer(working, (cand.coord, unit.owner), here, amount);
                self.ledger.record(grid, unit.owner, back, amount);
                touched.extend([cand.coord, unit.coord]);
            }
        }

        for cand in candidates.iter().filter(|c| c.quantity < target) {
            let out = GateKey::new(unit.coord, cand.dir);
            let budget = self.ledger.remaining(grid, self.gates, unit.owner, out);
            let available = working.get(&here).copied().unwrap_or(0);
            let amount = (target - cand.quantity).min(budget).min(available);
            if amount > 0 {
                transfer(working, here, (cand.coord, unit.owner), amount);
                self.ledger.record(grid, unit.owner, out, amount);
                touched.extend([unit.coord, cand.coord]);
            }
        }

        touched
    }

    /// Fold the iteration's deltas into the grid and the overlay.
    fn commit(&mut self, baseline: &BTreeMap<OwnerKey, i64>, working: &BTreeMap<OwnerKey, i64>) {
        let mut foreign: BTreeMap<Coord, Vec<(PlayerId, i64)>> = BTreeMap::new();

        for (&(coord, owner), &after) in working {
            let delta = after - baseline.get(&(coord, owner)).copied().unwrap_or(0);
            if delta == 0 {
                continue;
            }
            let Some(cell) = self.grid.get_mut(coord) else {
                continue;
            };
            if cell.owner == Some(owner) {
                let merged = (i64::from(cell.quantity) + delta).max(0);
                cell.quantity = u32::try_from(merged).unwrap_or(u32::MAX);
            } else {
                foreign.entry(coord).or_default().push((owner, delta));
            }
        }

        for (coord, deltas) in foreign {
            let unclaimed = self
                .grid
                .get(coord)
                .is_some_and(|c| c.owner.is_none() && c.quantity == 0);
            if unclaimed && !self.forces.contains_cell(coord) {
                if let [(owner, delta)] = deltas.as_slice() {
                    if *delta > 0 {
                        if let Some(cell) = self.grid.get_mut(coord) {
                            cell.update(Some(*owner), u32::try_from(*delta).unwrap_or(u32::MAX));
                        }
                        continue;
                    }
                }
            }
            for (owner, delta) in deltas {
                self.forces.add(coord, owner, delta);
            }
        }
    }

    /// Cells touched plus everything reachable from them through an open gate.
    fn reschedule(&self, touched: &BTreeSet<Coord>) -> BTreeSet<Coord> {
        let mut next = touched.clone();
        for &coord in touched {
            next.extend(self.grid.open_gates(coord).map(|(_, n)| n));
        }
        next
    }
}

fn transfer(working: &mut BTreeMap<OwnerKey, i64>, from: OwnerKey, to: OwnerKey, amount: i64) {
    *working.entry(from).or_insert(0) -= amount;
    *working.entry(to).or_insert(0) += amount;
}

/// Run one tick of force flow over `grid`.
///
/// Geysers erupt once, then up to `config.iterations` passes move force
/// through open gates. Cells and pools are capped at `config.max_quantity`
/// only after the last pass. The returned overlay still has to go through
/// [`resolve_combat`](crate::game::resolve_combat).
pub fn equilibrate(
    grid: &mut Grid,
    gates: &Gates,
    geysers: &Geysers,
    config: &SimConfig,
) -> Equilibrium {
    let produced = geysers.erupt(grid);

    let mut solver = Solver {
        grid,
        gates,
        config,
        forces: CombatForces::new(),
        ledger: FlowLedger::default(),
    };

    let mut scheduled: BTreeSet<Coord> = solver.grid.iter().map(|(c, _)| c).collect();
    let mut active_iterations = 0;
    let mut units_visited = 0;

    for iteration in 0..solver.config.iterations {
        let baseline = solver.effective_view();
        let mut working = baseline.clone();
        let mut heap = solver.schedule(&scheduled);
        let mut touched = BTreeSet::new();

        while let Some(unit) = heap.pop() {
            units_visited += 1;
            touched.extend(solver.visit(unit, &mut working));
        }

        tracing::trace!(iteration, cells = touched.len(), "equilibration pass");
        if touched.is_empty() {
            break;
        }
        active_iterations += 1;

        solver.commit(&baseline, &working);
        scheduled = solver.reschedule(&touched);
    }

    let max = solver.config.max_quantity;
    solver.grid.truncate_all(max);
    solver.forces.truncate(max);

    Equilibrium {
        flow: solver.ledger.net_flow(),
        owner_flow: solver.ledger.owner_flow(),
        forces: solver.forces,
        produced,
        active_iterations,
        units_visited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Cell, Pressure, Tier};

    fn open(grid: &mut Grid, gates: &mut Gates, coord: Coord, dir: Direction, momentum: u32) {
        grid.set_gate(coord, dir, true).unwrap();
        let key = GateKey::new(coord, dir);
        gates.set_momentum(key, momentum);
        gates.set_momentum(key.mirror(grid).unwrap(), momentum);
    }

    #[test]
    fn test_momentum_caps_flow_into_empty_cell() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 2).unwrap();
        let mut gates = Gates::new();
        grid.set(Coord::new(0, 0), Cell::owned(1, 1000));
        open(&mut grid, &mut gates, Coord::new(0, 0), Direction::East, 400);

        let eq = equilibrate(&mut grid, &gates, &Geysers::new(), &config);

        let source = grid.get(Coord::new(0, 0)).unwrap();
        let sink = grid.get(Coord::new(0, 1)).unwrap();
        assert_eq!(sink.quantity, 400);
        assert_eq!(sink.owner, Some(1));
        assert_eq!(source.quantity + sink.quantity, 1000);
        assert!(eq.forces.is_empty());
        assert_eq!(eq.flow.get(&GateKey::new(Coord::new(0, 0), Direction::East)), Some(&400));
    }

    #[test]
    fn test_equalizes_when_momentum_allows() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 3).unwrap();
        let mut gates = Gates::new();
        grid.set(Coord::new(0, 0), Cell::owned(1, 900));
        open(&mut grid, &mut gates, Coord::new(0, 0), Direction::East, 600);
        open(&mut grid, &mut gates, Coord::new(0, 1), Direction::East, 600);

        equilibrate(&mut grid, &gates, &Geysers::new(), &config);

        let total: u32 = grid.cells().iter().map(|c| c.quantity).sum();
        assert_eq!(total, 900);
        for cell in grid.cells() {
            assert_eq!(cell.owner, Some(1));
            assert!(cell.quantity >= 250, "uneven spread: {:?}", grid.cells());
        }
    }

    #[test]
    fn test_closed_gate_blocks_flow() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 2).unwrap();
        grid.set(Coord::new(0, 0), Cell::owned(1, 800));

        let eq = equilibrate(&mut grid, &Gates::new(), &Geysers::new(), &config);

        assert_eq!(grid.get(Coord::new(0, 0)).unwrap().quantity, 800);
        assert_eq!(grid.get(Coord::new(0, 1)).unwrap().owner, None);
        assert!(eq.flow.is_empty());
    }

    #[test]
    fn test_geyser_erupts_once_before_flow() {
        let config = SimConfig::default();
        let mut grid = Grid::new(2, 2).unwrap();
        grid.set(Coord::new(1, 1), Cell::owned(2, 100));
        let mut geysers = Geysers::new();
        geysers.place(Coord::new(1, 1), Tier::Home);

        let eq = equilibrate(&mut grid, &Gates::new(), &geysers, &config);

        assert_eq!(eq.produced, 500);
        assert_eq!(grid.get(Coord::new(1, 1)).unwrap().quantity, 600);
    }

    #[test]
    fn test_truncates_after_flow() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 1).unwrap();
        grid.set(Coord::new(0, 0), Cell::owned(1, 900));
        let mut geysers = Geysers::new();
        geysers.place(Coord::new(0, 0), Tier::Home);

        equilibrate(&mut grid, &Gates::new(), &geysers, &config);
        assert_eq!(grid.get(Coord::new(0, 0)).unwrap().quantity, 1000);
    }

    #[test]
    fn test_enemy_cell_receives_pool_not_quantity() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 3).unwrap();
        let mut gates = Gates::new();
        grid.set(Coord::new(0, 0), Cell::owned(1, 1000));
        grid.set(Coord::new(0, 1), Cell::owned(2, 100));
        open(&mut grid, &mut gates, Coord::new(0, 0), Direction::East, 300);
        open(&mut grid, &mut gates, Coord::new(0, 1), Direction::East, 300);

        let eq = equilibrate(&mut grid, &gates, &Geysers::new(), &config);

        // Player 2 keeps their own quantity apart from the attack
        let middle = grid.get(Coord::new(0, 1)).unwrap();
        assert_eq!(middle.owner, Some(2));
        assert!(eq.forces.get(Coord::new(0, 1), 1) > 0);

        // The pool never relays player 1 force past the contested cell
        assert_eq!(eq.forces.get(Coord::new(0, 2), 1), 0);
        let far = grid.get(Coord::new(0, 2)).unwrap();
        assert_ne!(far.owner, Some(1));
    }

    #[test]
    fn test_per_owner_budget_is_independent() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 3).unwrap();
        let mut gates = Gates::new();
        grid.set(Coord::new(0, 0), Cell::owned(1, 800));
        grid.set(Coord::new(0, 2), Cell::owned(2, 800));
        open(&mut grid, &mut gates, Coord::new(0, 0), Direction::East, 100);
        open(&mut grid, &mut gates, Coord::new(0, 1), Direction::East, 100);

        let eq = equilibrate(&mut grid, &gates, &Geysers::new(), &config);

        // Both owners fill the empty middle cell up to their own momentum
        let middle = Coord::new(0, 1);
        let p1 = eq.forces.get(middle, 1) + grid.get(middle).filter(|c| c.owner == Some(1)).map_or(0, |c| c.quantity);
        let p2 = eq.forces.get(middle, 2) + grid.get(middle).filter(|c| c.owner == Some(2)).map_or(0, |c| c.quantity);
        assert_eq!(p1, 100);
        assert_eq!(p2, 100);
    }

    #[test]
    fn test_conservation_without_combat() {
        let config = SimConfig::default();
        let mut grid = Grid::new(3, 3).unwrap();
        let mut gates = Gates::new();
        grid.set(Coord::new(1, 1), Cell::owned(1, 1000));
        for dir in Direction::ALL {
            open(&mut grid, &mut gates, Coord::new(1, 1), dir, 150);
        }
        let pressure = Pressure::zeroed(&grid);
        assert_eq!(pressure.get(Coord::new(1, 1)), 0);

        equilibrate(&mut grid, &gates, &Geysers::new(), &config);

        let total: u32 = grid.cells().iter().map(|c| c.quantity).sum();
        assert_eq!(total, 1000);
        for dir in Direction::ALL {
            let n = grid.neighbor(Coord::new(1, 1), dir).unwrap();
            assert_eq!(grid.get(n).unwrap().quantity, 150);
        }
    }

    #[test]
    fn test_unit_ordering_tie_break() {
        let a = Unit { quantity: 50, coord: Coord::new(0, 3), owner: 2, pooled: false };
        let b = Unit { quantity: 50, coord: Coord::new(1, 0), owner: 1, pooled: false };
        let c = Unit { quantity: 60, coord: Coord::new(5, 5), owner: 3, pooled: true };
        let mut heap: BinaryHeap<Unit> = [a, b, c].into_iter().collect();
        assert_eq!(heap.pop(), Some(c));
        assert_eq!(heap.pop(), Some(a));
        assert_eq!(heap.pop(), Some(b));
    }
}
