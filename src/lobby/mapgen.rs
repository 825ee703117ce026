//! Deterministic board generation for new games.

// Board generation uses intentional casts for coordinate/RNG operations
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use crate::config::SimConfig;
use crate::game::{Board, Cell, Coord, Direction, GateKey, Grid, PlayerId, Tier, MAX_PLAYERS};

/// Force each player starts with on their home cell.
pub const HOME_QUANTITY: u32 = 500;

/// Deterministic PRNG using xorshift64.
#[derive(Debug, Clone, Copy)]
struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed.
    const fn new(seed: u64) -> Self {
        // Ensure non-zero state
        let state = if seed == 0 { 0x5555_5555_5555_5555 } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Random u32 in [0, max).
    fn next_u32(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(max)) as u32
    }

    /// Random f64 in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() as f64) / (u64::MAX as f64)
    }
}

/// Error type for board generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("board generation failed: {reason}")]
pub struct MapGenError {
    /// Description of the error.
    pub reason: String,
}

impl MapGenError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Generate a board with a home for each of `num_players` seats.
///
/// Every home cell is owned by its seat, holds [`HOME_QUANTITY`], sits on
/// a [`Tier::Home`] geyser and has its gates to all on-board neighbors
/// already open. The rest of the board is neutral, with scattered
/// obstacles and smaller geysers.
///
/// # Errors
///
/// Returns an error if the seat count or dimensions are invalid, or the
/// homes cannot be spaced apart.
pub fn generate_board(
    seed: u64,
    rows: u16,
    cols: u16,
    num_players: usize,
    config: &SimConfig,
) -> Result<Board, MapGenError> {
    if !(2..=MAX_PLAYERS).contains(&num_players) {
        return Err(MapGenError::new(format!(
            "need 2 to {MAX_PLAYERS} players, got {num_players}"
        )));
    }
    if rows < 3 || cols < 3 {
        return Err(MapGenError::new(format!(
            "a {rows}x{cols} board is too small"
        )));
    }
    let grid = Grid::new(rows, cols)
        .ok_or_else(|| MapGenError::new(format!("a {rows}x{cols} board is too large")))?;

    let mut rng = Rng::new(seed);
    let homes = find_home_positions(&grid, num_players, &mut rng)?;

    let mut board = Board::new(grid);
    place_obstacles(&mut board.grid, &homes, &mut rng);
    place_field_geysers(&mut board, &homes, &mut rng);

    for (i, &coord) in homes.iter().enumerate() {
        // Seats are 1-indexed
        let player: PlayerId = (i + 1) as PlayerId;
        board.grid.set(coord, Cell::owned(player, HOME_QUANTITY));
        board.geysers.place(coord, Tier::Home);
    }
    for &coord in &homes {
        for dir in Direction::ALL {
            if board.grid.neighbor(coord, dir).is_some() {
                board
                    .force_open(GateKey::new(coord, dir), config)
                    .map_err(|e| MapGenError::new(e.to_string()))?;
            }
        }
    }

    Ok(board)
}

const fn distance(a: Coord, b: Coord) -> u16 {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col)
}

/// Spread homes around the center, keeping them at least three steps apart.
fn find_home_positions(
    grid: &Grid,
    num_players: usize,
    rng: &mut Rng,
) -> Result<Vec<Coord>, MapGenError> {
    let rows = grid.rows();
    let cols = grid.cols();
    let candidates: Vec<Coord> = grid.iter().map(|(c, _)| c).collect();

    let center_row = f64::from(rows - 1) / 2.0;
    let center_col = f64::from(cols - 1) / 2.0;
    let radius_row = f64::from(rows) * 0.35;
    let radius_col = f64::from(cols) * 0.35;

    let mut homes: Vec<Coord> = Vec::with_capacity(num_players);
    let angle_step = std::f64::consts::TAU / (num_players as f64);
    let angle_offset = rng.next_f64() * std::f64::consts::TAU;

    for i in 0..num_players {
        let angle = angle_offset + (i as f64) * angle_step;
        let target_row = center_row + radius_row * angle.sin();
        let target_col = center_col + radius_col * angle.cos();

        let best = candidates
            .iter()
            .filter(|&&c| homes.iter().all(|&h| distance(c, h) >= 3))
            .min_by_key(|&&c| {
                let dr = f64::from(c.row) - target_row;
                let dc = f64::from(c.col) - target_col;
                ((dr * dr + dc * dc) * 1000.0) as u64
            })
            .copied()
            .ok_or_else(|| {
                MapGenError::new(format!(
                    "no room for {num_players} homes on a {rows}x{cols} board"
                ))
            })?;
        homes.push(best);
    }

    Ok(homes)
}

/// Obstacles on ~8% of cells, never on or next to a home.
fn place_obstacles(grid: &mut Grid, homes: &[Coord], rng: &mut Rng) {
    let coords: Vec<Coord> = grid.iter().map(|(c, _)| c).collect();
    for coord in coords {
        let roll = rng.next_f64();
        if roll < 0.08 && homes.iter().all(|&h| distance(coord, h) > 1) {
            grid.set(coord, Cell::obstacle());
        }
    }
}

/// One field geyser per ~12 open cells, away from homes.
fn place_field_geysers(board: &mut Board, homes: &[Coord], rng: &mut Rng) {
    let open: Vec<Coord> = board
        .grid
        .iter()
        .filter(|(c, cell)| !cell.obstacle && homes.iter().all(|&h| distance(*c, h) > 1))
        .map(|(c, _)| c)
        .collect();
    let target = open.len() / 12;

    let mut placed = 0;
    let mut attempts = 0;
    while placed < target && attempts < target * 8 {
        attempts += 1;
        let Some(&coord) = open.get(rng.next_u32(open.len() as u32) as usize) else {
            continue;
        };
        let tier = match rng.next_u32(6) {
            0 => Tier::Large,
            1 | 2 => Tier::Medium,
            _ => Tier::Small,
        };
        if board.geysers.place(coord, tier) {
            placed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = Rng::new(12345);
        let mut rng2 = Rng::new(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_board_generation_determinism() {
        let config = SimConfig::default();
        let a = generate_board(42, 10, 12, 3, &config).unwrap();
        let b = generate_board(42, 10, 12, 3, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_board_generation_different_seeds() {
        let config = SimConfig::default();
        let a = generate_board(42, 12, 12, 2, &config).unwrap();
        let b = generate_board(43, 12, 12, 2, &config).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_homes_are_set_up() {
        let config = SimConfig::default();
        for players in 2..=MAX_PLAYERS {
            let board = generate_board(7, 16, 16, players, &config).unwrap();
            assert_eq!(board.holders().len(), players);
            for (coord, cell) in board.grid.iter().filter(|(_, c)| c.owner.is_some()) {
                assert_eq!(cell.quantity, HOME_QUANTITY);
                assert_eq!(board.geysers.get(coord), Some(Tier::Home));
                for dir in Direction::ALL {
                    if board.grid.neighbor(coord, dir).is_some() {
                        assert!(cell.gate(dir));
                        let key = GateKey::new(coord, dir);
                        assert!(board.gates.momentum(key).is_some());
                        assert!(board.gates.momentum(key.mirror(&board.grid).unwrap()).is_some());
                    }
                }
            }
        }
    }

    #[test]
    fn test_rejects_bad_requests() {
        let config = SimConfig::default();
        assert!(generate_board(1, 8, 8, 1, &config).is_err());
        assert!(generate_board(1, 8, 8, 9, &config).is_err());
        assert!(generate_board(1, 2, 8, 2, &config).is_err());
        assert!(generate_board(1, 30, 8, 2, &config).is_err());
        assert!(generate_board(1, 3, 3, 8, &config).is_err());
    }
}
