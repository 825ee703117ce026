//! Combat resolution.
//!
//! Each force is raised to a power (the combat index) so that larger forces
//! are disproportionately stronger. An owner takes a cell only if its index
//! beats every other index present combined; otherwise everyone is wiped
//! out and the cell goes neutral. The pre-tick resident fights at a penalty.

use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::game::{Coord, Grid, PlayerId};

/// Force that entered cells it did not own during a tick.
///
/// Pools stay here, apart from the grid, until combat folds them into the
/// cells at the end of the tick. A pool never routes force onward through
/// territory its owner does not already hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombatForces {
    pools: BTreeMap<(Coord, PlayerId), u32>,
}

impl CombatForces {
    /// An empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool of `owner` at `coord`.
    #[must_use]
    pub fn get(&self, coord: Coord, owner: PlayerId) -> u32 {
        self.pools.get(&(coord, owner)).copied().unwrap_or(0)
    }

    /// Add a signed amount to a pool; empty pools are dropped.
    pub fn add(&mut self, coord: Coord, owner: PlayerId, delta: i64) {
        let current = i64::from(self.get(coord, owner));
        let next = (current + delta).max(0);
        if next == 0 {
            self.pools.remove(&(coord, owner));
        } else {
            self.pools
                .insert((coord, owner), u32::try_from(next).unwrap_or(u32::MAX));
        }
    }

    /// Pools at one cell, by owner.
    pub fn at(&self, coord: Coord) -> impl Iterator<Item = (PlayerId, u32)> + '_ {
        self.pools
            .range((coord, PlayerId::MIN)..=(coord, PlayerId::MAX))
            .map(|((_, owner), force)| (*owner, *force))
    }

    /// Whether any pool exists at `coord`.
    #[must_use]
    pub fn contains_cell(&self, coord: Coord) -> bool {
        self.at(coord).next().is_some()
    }

    /// Every pool.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, PlayerId, u32)> + '_ {
        self.pools.iter().map(|((c, o), f)| (*c, *o, *f))
    }

    /// Cells holding at least one pool, in row-major order.
    #[must_use]
    pub fn cells(&self) -> Vec<Coord> {
        let mut cells: Vec<Coord> = self.pools.keys().map(|(c, _)| *c).collect();
        cells.dedup();
        cells
    }

    /// Whether the overlay is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Total force in all pools.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pools.values().map(|f| u64::from(*f)).sum()
    }

    /// Cap every pool at `max`.
    pub fn truncate(&mut self, max: u32) {
        for force in self.pools.values_mut() {
            *force = (*force).min(max);
        }
    }
}

/// One side of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contestant {
    /// Owner of the force (None = neutral resident force).
    pub owner: Option<PlayerId>,
    /// Force brought to the cell.
    pub force: u32,
}

/// Result of combat on a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatResult {
    /// New owner (None if the cell becomes neutral).
    pub winner: Option<PlayerId>,
    /// Surviving force.
    pub remaining: u32,
}

impl CombatResult {
    const WIPED: Self = Self {
        winner: None,
        remaining: 0,
    };
}

/// A contest that took place during a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Skirmish {
    /// Cell fought over.
    pub coord: Coord,
    /// Owner of the cell before the tick.
    pub defender: Option<PlayerId>,
    /// Everyone present.
    pub contestants: Vec<Contestant>,
    /// Outcome.
    pub result: CombatResult,
}

/// Power-law strength of a force.
#[must_use]
pub fn combat_index(force: f64, exponent: f64) -> f64 {
    force.max(0.0).powf(exponent)
}

/// Resolve a contest among `contestants` on a cell held by `defender`
/// before the tick.
#[must_use]
pub fn resolve_contest(
    contestants: &[Contestant],
    defender: Option<PlayerId>,
    config: &SimConfig,
) -> CombatResult {
    let mut present: Vec<&Contestant> = contestants.iter().filter(|c| c.force > 0).collect();
    // Fixed summation order
    present.sort_by_key(|c| (c.owner, c.force));
    match present.as_slice() {
        [] => return CombatResult::WIPED,
        [only] => {
            return CombatResult {
                winner: only.owner,
                remaining: only.force,
            };
        }
        _ => {}
    }

    let indices: Vec<f64> = present
        .iter()
        .map(|c| {
            let mut effective = f64::from(c.force);
            if c.owner == defender {
                effective *= config.defender_penalty;
            }
            combat_index(effective, config.combat_exponent)
        })
        .collect();
    let total: f64 = indices.iter().sum();

    for (contestant, &index) in present.iter().zip(&indices) {
        let others = total - index;
        if index > others {
            let survivor = (index - others).powf(config.combat_exponent.recip()).round();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let remaining = (survivor.min(f64::from(config.max_quantity))) as u32;
            return CombatResult {
                winner: contestant.owner,
                remaining,
            };
        }
    }

    CombatResult::WIPED
}

/// Settle every cell that holds foreign force.
///
/// `defenders` gives each cell's owner before the tick, in row-major order.
/// The overlay is consumed: after this call every force lives on the grid.
pub fn resolve_combat(
    grid: &mut Grid,
    forces: CombatForces,
    defenders: &[Option<PlayerId>],
    config: &SimConfig,
) -> Vec<Skirmish> {
    let mut skirmishes = Vec::new();
    let cols = usize::from(grid.cols());

    for coord in forces.cells() {
        let Some(cell) = grid.get_mut(coord) else {
            continue;
        };
        let mut contestants = Vec::new();
        if cell.quantity > 0 {
            contestants.push(Contestant {
                owner: cell.owner,
                force: cell.quantity,
            });
        }
        contestants.extend(forces.at(coord).map(|(owner, force)| Contestant {
            owner: Some(owner),
            force,
        }));

        let defender = defenders
            .get(usize::from(coord.row) * cols + usize::from(coord.col))
            .copied()
            .flatten();
        let result = resolve_contest(&contestants, defender, config);
        cell.update(result.winner, result.remaining);

        if contestants.len() > 1 {
            skirmishes.push(Skirmish {
                coord,
                defender,
                contestants,
                result,
            });
        }
    }

    skirmishes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cell;

    fn attackers(forces: &[(PlayerId, u32)]) -> Vec<Contestant> {
        forces
            .iter()
            .map(|&(owner, force)| Contestant {
                owner: Some(owner),
                force,
            })
            .collect()
    }

    #[test]
    fn test_single_force_keeps_cell() {
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 10)]), None, &config);
        assert_eq!(result.winner, Some(1));
        assert_eq!(result.remaining, 10);
    }

    #[test]
    fn test_strongest_beats_combined() {
        // 500² = 250000 > 300² + 300² = 180000; sqrt(70000) ≈ 264.6
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 300), (2, 300), (3, 500)]), None, &config);
        assert_eq!(result.winner, Some(3));
        assert_eq!(result.remaining, 265);
    }

    #[test]
    fn test_three_way_stalemate_wipes() {
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 400), (2, 400), (3, 400)]), None, &config);
        assert_eq!(result, CombatResult::WIPED);
    }

    #[test]
    fn test_equal_pair_wipes() {
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 250), (2, 250)]), None, &config);
        assert_eq!(result.winner, None);
        assert_eq!(result.remaining, 0);
    }

    #[test]
    fn test_defender_penalty_tips_even_fight() {
        // Defender 100 * 0.9 = 90 against 100: attacker wins with sqrt(10000 - 8100) ≈ 43.6
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 100), (2, 100)]), Some(1), &config);
        assert_eq!(result.winner, Some(2));
        assert_eq!(result.remaining, 44);
    }

    #[test]
    fn test_nonlinear_index_favours_mass() {
        // Linear subtraction would leave 100; the power law leaves more
        let config = SimConfig::default();
        let result = resolve_contest(&attackers(&[(1, 400), (2, 300)]), None, &config);
        assert_eq!(result.winner, Some(1));
        assert_eq!(result.remaining, 265);
    }

    #[test]
    fn test_neutral_resident_can_hold() {
        let config = SimConfig::default();
        let contestants = [
            Contestant {
                owner: None,
                force: 300,
            },
            Contestant {
                owner: Some(1),
                force: 100,
            },
        ];
        let result = resolve_contest(&contestants, Some(2), &config);
        assert_eq!(result.winner, None);
        assert!(result.remaining > 0);
    }

    #[test]
    fn test_overlay_add_and_drop() {
        let mut forces = CombatForces::new();
        let c = Coord::new(1, 2);
        forces.add(c, 1, 40);
        forces.add(c, 2, 10);
        forces.add(c, 1, -15);
        assert_eq!(forces.get(c, 1), 25);
        forces.add(c, 2, -10);
        assert_eq!(forces.at(c).collect::<Vec<_>>(), vec![(1, 25)]);
        assert_eq!(forces.cells(), vec![c]);
        forces.add(c, 1, -100);
        assert!(forces.is_empty());
    }

    #[test]
    fn test_resolve_combat_folds_overlay() {
        let config = SimConfig::default();
        let mut grid = Grid::new(1, 3).unwrap();
        grid.set(Coord::new(0, 1), Cell::owned(1, 100));
        let defenders: Vec<_> = grid.cells().iter().map(|c| c.owner).collect();

        let mut forces = CombatForces::new();
        forces.add(Coord::new(0, 1), 2, 200);
        forces.add(Coord::new(0, 2), 3, 50);

        let skirmishes = resolve_combat(&mut grid, forces, &defenders, &config);

        assert_eq!(skirmishes.len(), 1);
        let fought = grid.get(Coord::new(0, 1)).unwrap();
        assert_eq!(fought.owner, Some(2));
        // sqrt(200² - 90²) ≈ 178.6
        assert_eq!(fought.quantity, 179);

        // Uncontested entry just takes the empty cell
        let taken = grid.get(Coord::new(0, 2)).unwrap();
        assert_eq!(taken.owner, Some(3));
        assert_eq!(taken.quantity, 50);
    }
}
