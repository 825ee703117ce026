//! Player seats.

use serde::{Deserialize, Serialize};

/// Seat number of a player (1-based).
pub type PlayerId = u8;

/// Maximum number of players in a game.
pub const MAX_PLAYERS: usize = 8;

/// State for a single seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Seat number.
    pub id: PlayerId,
    /// Address notifications are delivered to.
    pub address: String,
    /// Tick on which the player lost their last cell.
    pub eliminated_tick: Option<u32>,
}

impl Player {
    /// Create a new player in the given seat.
    #[must_use]
    pub fn new(id: PlayerId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            eliminated_tick: None,
        }
    }

    /// Whether the player is still in the game.
    #[must_use]
    pub const fn alive(&self) -> bool {
        self.eliminated_tick.is_none()
    }

    /// Eliminate this player on `tick`.
    pub fn eliminate(&mut self, tick: u32) {
        if self.eliminated_tick.is_none() {
            self.eliminated_tick = Some(tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_creation() {
        let player = Player::new(1, "ann@example.org");
        assert_eq!(player.id, 1);
        assert!(player.alive());
    }

    #[test]
    fn test_player_eliminate_keeps_first_tick() {
        let mut player = Player::new(2, "bo@example.org");
        player.eliminate(7);
        player.eliminate(9);
        assert!(!player.alive());
        assert_eq!(player.eliminated_tick, Some(7));
    }
}
