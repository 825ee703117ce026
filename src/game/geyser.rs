//! Geysers: fixed force generators layered on cells.

use std::collections::BTreeMap;
use std::fmt;

use crate::game::{Coord, Grid};

/// Size class of a geyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Starting geyser under each player's home cell.
    Home,
    /// Large field geyser.
    Large,
    /// Medium field geyser.
    Medium,
    /// Small field geyser.
    Small,
}

impl Tier {
    /// Force added to the occupying cell each tick.
    #[must_use]
    pub const fn power(self) -> u32 {
        match self {
            Tier::Home => 500,
            Tier::Large => 300,
            Tier::Medium => 200,
            Tier::Small => 100,
        }
    }

    /// Notation letter.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Tier::Home => 'H',
            Tier::Large => 'L',
            Tier::Medium => 'M',
            Tier::Small => 'S',
        }
    }

    /// Parse a notation letter.
    #[must_use]
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'H' => Some(Tier::Home),
            'L' => Some(Tier::Large),
            'M' => Some(Tier::Medium),
            'S' => Some(Tier::Small),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// All geysers on a board, at most one per cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geysers {
    by_coord: BTreeMap<Coord, Tier>,
}

impl Geysers {
    /// No geysers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a geyser. Returns `false` if the cell already hosts one.
    pub fn place(&mut self, coord: Coord, tier: Tier) -> bool {
        if self.by_coord.contains_key(&coord) {
            return false;
        }
        self.by_coord.insert(coord, tier);
        true
    }

    /// Tier of the geyser at `coord`.
    #[must_use]
    pub fn get(&self, coord: Coord) -> Option<Tier> {
        self.by_coord.get(&coord).copied()
    }

    /// Iterate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Tier)> + '_ {
        self.by_coord.iter().map(|(c, t)| (*c, *t))
    }

    /// Number of geysers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_coord.len()
    }

    /// Whether there are no geysers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_coord.is_empty()
    }

    /// Add each geyser's power to its cell if the cell has an owner.
    ///
    /// Returns the total force produced.
    pub fn erupt(&self, grid: &mut Grid) -> u64 {
        let mut produced = 0u64;
        for (coord, tier) in self.iter() {
            if let Some(cell) = grid.get_mut(coord)
                && cell.owner.is_some()
                && !cell.obstacle
            {
                cell.quantity = cell.quantity.saturating_add(tier.power());
                produced += u64::from(tier.power());
            }
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cell;

    #[test]
    fn test_tier_power_ordering() {
        assert!(Tier::Home.power() > Tier::Large.power());
        assert!(Tier::Large.power() > Tier::Medium.power());
        assert!(Tier::Medium.power() > Tier::Small.power());
    }

    #[test]
    fn test_tier_letters() {
        for tier in [Tier::Home, Tier::Large, Tier::Medium, Tier::Small] {
            assert_eq!(Tier::from_letter(tier.letter()), Some(tier));
        }
        assert_eq!(Tier::from_letter('Z'), None);
    }

    #[test]
    fn test_one_geyser_per_cell() {
        let mut geysers = Geysers::new();
        assert!(geysers.place(Coord::new(1, 1), Tier::Small));
        assert!(!geysers.place(Coord::new(1, 1), Tier::Home));
        assert_eq!(geysers.get(Coord::new(1, 1)), Some(Tier::Small));
    }

    #[test]
    fn test_erupt_only_feeds_owned_cells() {
        let mut grid = Grid::new(2, 2).unwrap();
        grid.set(Coord::new(0, 0), Cell::owned(1, 10));
        let mut geysers = Geysers::new();
        geysers.place(Coord::new(0, 0), Tier::Home);
        geysers.place(Coord::new(1, 1), Tier::Large);

        let produced = geysers.erupt(&mut grid);
        assert_eq!(produced, 500);
        assert_eq!(grid.get(Coord::new(0, 0)).unwrap().quantity, 510);
        assert_eq!(grid.get(Coord::new(1, 1)).unwrap().quantity, 0);
    }
}
