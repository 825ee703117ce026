//! Board invariants - sanity checks that detect engine bugs.
//!
//! None of these should ever fire after a tick. A violation means the
//! merge, flow or combat code broke a rule, and the tick must not be saved.

use crate::config::SimConfig;
use crate::game::{Direction, GameState, GateKey};

/// Invariant violation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

/// Check all board invariants.
///
/// Returns a list of violations found, or empty if all invariants hold.
#[must_use]
pub fn check_invariants(state: &GameState, config: &SimConfig) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    let board = &state.board;
    let grid = &board.grid;

    for (coord, cell) in grid.iter() {
        if cell.quantity > config.max_quantity {
            violations.push(InvariantViolation {
                message: format!(
                    "Cell {coord} holds {} > max {}",
                    cell.quantity, config.max_quantity
                ),
            });
        }

        if cell.obstacle && (cell.owner.is_some() || cell.quantity > 0) {
            violations.push(InvariantViolation {
                message: format!("Obstacle {coord} holds force"),
            });
        }

        for dir in Direction::ALL {
            let open = cell.gate(dir);
            let key = GateKey::new(coord, dir);

            if open && cell.obstacle {
                violations.push(InvariantViolation {
                    message: format!("Obstacle {coord} has open gate {dir}"),
                });
            }

            match grid.neighbor(coord, dir).and_then(|n| grid.get(n)) {
                Some(other) if other.gate(dir.opposite()) != open => {
                    violations.push(InvariantViolation {
                        message: format!("Gate {key} is not mirrored"),
                    });
                }
                None if open => {
                    violations.push(InvariantViolation {
                        message: format!("Gate {key} is open off the board"),
                    });
                }
                _ => {}
            }

            match (open, board.gates.momentum(key)) {
                (true, None) => violations.push(InvariantViolation {
                    message: format!("Open gate {key} has no momentum"),
                }),
                (false, Some(_)) => violations.push(InvariantViolation {
                    message: format!("Closed gate {key} still has momentum"),
                }),
                (true, Some(m)) if m < config.momentum_floor || m > config.momentum_ceiling => {
                    violations.push(InvariantViolation {
                        message: format!(
                            "Gate {key} momentum {m} outside [{}, {}]",
                            config.momentum_floor, config.momentum_ceiling
                        ),
                    });
                }
                _ => {}
            }
        }
    }

    for (key, _) in board.gates.iter() {
        if !grid.in_bounds(key.coord) {
            violations.push(InvariantViolation {
                message: format!("Momentum tracked for off-board gate {key}"),
            });
        }
    }

    for (coord, _) in board.geysers.iter() {
        if grid.get(coord).is_none_or(|cell| cell.obstacle) {
            violations.push(InvariantViolation {
                message: format!("Geyser {coord} is not on a playable cell"),
            });
        }
    }

    // Elimination consistency
    for player in &state.players {
        if !player.alive() {
            let territory = grid.territory(player.id);
            if territory > 0 {
                violations.push(InvariantViolation {
                    message: format!("Dead player {} still owns {} cells", player.id, territory),
                });
            }
        }
    }

    violations
}

/// Assert all board invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(state: &GameState, config: &SimConfig) {
    let violations = check_invariants(state, config);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Board invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(_state: &GameState, _config: &SimConfig) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Board, Cell, Coord, Grid, Player, Tier};

    fn create_valid_game() -> GameState {
        let config = SimConfig::default();
        let mut grid = Grid::new(3, 3).unwrap();
        grid.set(Coord::new(1, 1), Cell::owned(1, 500));
        grid.set(Coord::new(2, 2), Cell::obstacle());
        let mut board = Board::new(grid);
        board.geysers.place(Coord::new(1, 1), Tier::Home);
        board
            .force_open(GateKey::new(Coord::new(1, 1), Direction::North), &config)
            .unwrap();
        GameState::new(board, vec![Player::new(1, "a@example.org")], 0)
    }

    #[test]
    fn test_valid_game_passes() {
        let game = create_valid_game();
        let violations = check_invariants(&game, &SimConfig::default());
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn test_quantity_exactly_at_max_passes() {
        let mut game = create_valid_game();
        game.board.grid.get_mut(Coord::new(1, 1)).unwrap().quantity = 1000;
        assert!(check_invariants(&game, &SimConfig::default()).is_empty());
    }

    #[test]
    fn test_quantity_one_above_max_fails() {
        let mut game = create_valid_game();
        game.board.grid.get_mut(Coord::new(1, 1)).unwrap().quantity = 1001;
        let violations = check_invariants(&game, &SimConfig::default());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("1001"));
    }

    #[test]
    fn test_unmirrored_gate_detected() {
        let mut game = create_valid_game();
        game.board.grid.get_mut(Coord::new(0, 1)).unwrap().gates[Direction::South.index()] = false;
        let violations = check_invariants(&game, &SimConfig::default());
        assert!(violations.iter().any(|v| v.message.contains("not mirrored")));
        assert!(violations.iter().any(|v| v.message.contains("still has momentum")));
    }

    #[test]
    fn test_missing_momentum_detected() {
        let mut game = create_valid_game();
        game.board.gates = crate::game::Gates::new();
        let violations = check_invariants(&game, &SimConfig::default());
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.message.contains("no momentum")));
    }

    #[test]
    fn test_momentum_out_of_bounds_detected() {
        let mut game = create_valid_game();
        game.board
            .gates
            .set_momentum(GateKey::new(Coord::new(1, 1), Direction::North), 601);
        let violations = check_invariants(&game, &SimConfig::default());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("601"));
    }

    #[test]
    fn test_obstacle_gate_detected() {
        let mut game = create_valid_game();
        let grid = &mut game.board.grid;
        grid.get_mut(Coord::new(2, 2)).unwrap().gates[Direction::West.index()] = true;
        grid.get_mut(Coord::new(2, 1)).unwrap().gates[Direction::East.index()] = true;
        let violations = check_invariants(&game, &SimConfig::default());
        assert!(violations.iter().any(|v| v.message.contains("Obstacle")));
    }

    #[test]
    fn test_dead_player_with_territory_detected() {
        let mut game = create_valid_game();
        game.players[0].eliminate(3);
        let violations = check_invariants(&game, &SimConfig::default());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("Dead player"));
    }

    #[test]
    #[should_panic(expected = "Board invariant violations")]
    #[cfg(debug_assertions)]
    fn test_assert_invariants_panics() {
        let mut game = create_valid_game();
        game.board.grid.get_mut(Coord::new(0, 0)).unwrap().quantity = 5000;
        assert_invariants(&game, &SimConfig::default());
    }
}
