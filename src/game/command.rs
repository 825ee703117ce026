//! Gate commands and the text format players submit them in.
//!
//! ```text
//! OPEN B3E, B3S
//! close c4w
//! ```
//!
//! Each token is a location followed by a direction letter. A submission
//! replaces everything the player submitted earlier in the same tick window.

use std::collections::BTreeSet;
use std::fmt;

use crate::game::{Coord, Direction, GateKey, Grid, LocationError, PlayerId};

/// A request to open or close one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Command {
    /// Cell the gate belongs to.
    pub coord: Coord,
    /// Side of the cell.
    pub dir: Direction,
    /// Requested state.
    pub open: bool,
}

impl Command {
    /// Create a command.
    #[must_use]
    pub const fn new(coord: Coord, dir: Direction, open: bool) -> Self {
        Self { coord, dir, open }
    }

    /// The directed gate named by the command.
    #[must_use]
    pub const fn key(&self) -> GateKey {
        GateKey::new(self.coord, self.dir)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = if self.open { "OPEN" } else { "CLOSE" };
        write!(f, "{action} {}{}", self.coord, self.dir)
    }
}

/// A single problem found in a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// A line did not start with OPEN or CLOSE.
    #[error("line {line}: '{word}' is not OPEN or CLOSE")]
    UnknownAction {
        /// 1-based line number.
        line: usize,
        /// Offending word.
        word: String,
    },
    /// A line named an action but no gates.
    #[error("line {line}: no gates listed")]
    NoGates {
        /// 1-based line number.
        line: usize,
    },
    /// A token could not be read as a location and direction.
    #[error("line {line}: bad gate '{token}': {source}")]
    BadToken {
        /// 1-based line number.
        line: usize,
        /// Offending token.
        token: String,
        /// Why it failed.
        source: LocationError,
    },
    /// More commands than the game allows per tick.
    #[error("{count} commands submitted but this game allows {limit} per tick")]
    TooMany {
        /// Commands submitted.
        count: usize,
        /// Per-tick limit.
        limit: usize,
    },
    /// The same gate appears more than once.
    #[error("gate {0} is given more than one instruction")]
    Duplicate(GateKey),
    /// Location is not on the grid.
    #[error("{0} is not on the board")]
    OffGrid(Coord),
    /// Location is not held by the submitting player.
    #[error("{0} is not yours")]
    NotOwned(Coord),
    /// The gate leads off the grid.
    #[error("gate {0} leads off the board")]
    TargetOffGrid(GateKey),
    /// The gate leads into an obstacle.
    #[error("gate {0} leads into an obstacle")]
    TargetObstacle(GateKey),
}

/// A rejected submission. Nothing is stored when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Every problem found in the submission.
    #[error("submission rejected:\n{}", list_errors(.0))]
    Rejected(Vec<CommandError>),
}

impl SubmitError {
    /// The individual problems.
    #[must_use]
    pub fn errors(&self) -> &[CommandError] {
        match self {
            SubmitError::Rejected(errors) => errors,
        }
    }
}

fn list_errors(errors: &[CommandError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read the commands in a submission without looking at the board.
///
/// # Errors
///
/// Returns every syntax problem found.
pub fn parse_commands(text: &str) -> Result<Vec<Command>, Vec<CommandError>> {
    let mut commands = Vec::new();
    let mut errors = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (word, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        let open = match word.to_ascii_uppercase().as_str() {
            "OPEN" => true,
            "CLOSE" => false,
            _ => {
                errors.push(CommandError::UnknownAction {
                    line,
                    word: word.to_string(),
                });
                continue;
            }
        };

        let tokens: Vec<&str> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            errors.push(CommandError::NoGates { line });
            continue;
        }
        for token in tokens {
            match parse_token(token) {
                Ok((coord, dir)) => commands.push(Command::new(coord, dir, open)),
                Err(source) => errors.push(CommandError::BadToken {
                    line,
                    token: token.to_string(),
                    source,
                }),
            }
        }
    }

    if errors.is_empty() { Ok(commands) } else { Err(errors) }
}

fn parse_token(token: &str) -> Result<(Coord, Direction), LocationError> {
    let mut chars = token.chars();
    let last = chars
        .next_back()
        .ok_or_else(|| LocationError::Malformed(token.to_string()))?;
    let dir = Direction::from_letter(last)?;
    let coord = chars.as_str().parse()?;
    Ok((coord, dir))
}

/// Check commands against the board on behalf of `player`.
///
/// # Errors
///
/// Returns every violation: over the limit, duplicate gates, locations off
/// the board or not owned, gates leading off the board or into obstacles.
pub fn validate_commands(
    commands: &[Command],
    grid: &Grid,
    player: PlayerId,
    limit: usize,
) -> Result<(), Vec<CommandError>> {
    let mut errors = Vec::new();

    if commands.len() > limit {
        errors.push(CommandError::TooMany {
            count: commands.len(),
            limit,
        });
    }

    let mut seen = BTreeSet::new();
    for command in commands {
        let key = command.key();
        let physical = key.canonical(grid).map_or(key, |(canonical, _)| canonical);
        if !seen.insert(physical) {
            errors.push(CommandError::Duplicate(key));
        }

        let Some(cell) = grid.get(command.coord) else {
            errors.push(CommandError::OffGrid(command.coord));
            continue;
        };
        if cell.owner != Some(player) {
            errors.push(CommandError::NotOwned(command.coord));
        }
        match grid.neighbor(command.coord, command.dir).and_then(|n| grid.get(n)) {
            None => errors.push(CommandError::TargetOffGrid(key)),
            Some(target) if target.obstacle => errors.push(CommandError::TargetObstacle(key)),
            Some(_) => {}
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Parse and validate a whole submission.
///
/// # Errors
///
/// Returns [`SubmitError::Rejected`] with every problem found. Syntax
/// errors are reported together with the limit check; board checks only
/// run once the text parses.
pub fn check_submission(
    text: &str,
    grid: &Grid,
    player: PlayerId,
    limit: usize,
) -> Result<Vec<Command>, SubmitError> {
    let commands = parse_commands(text).map_err(|mut errors| {
        let count = count_tokens(text);
        if count > limit {
            errors.push(CommandError::TooMany { count, limit });
        }
        SubmitError::Rejected(errors)
    })?;
    validate_commands(&commands, grid, player, limit).map_err(SubmitError::Rejected)?;
    Ok(commands)
}

fn count_tokens(text: &str) -> usize {
    text.lines()
        .filter_map(|l| l.trim().split_once(char::is_whitespace).map(|(_, rest)| rest))
        .map(|rest| {
            rest.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .count()
        })
        .sum()
}

/// Canonical text form of a command list, one action per line.
#[must_use]
pub fn format_commands(commands: &[Command]) -> String {
    let mut lines = Vec::new();
    for (open, word) in [(true, "OPEN"), (false, "CLOSE")] {
        let tokens: Vec<String> = commands
            .iter()
            .filter(|c| c.open == open)
            .map(|c| format!("{}{}", c.coord, c.dir))
            .collect();
        if !tokens.is_empty() {
            lines.push(format!("{word} {}", tokens.join(",")));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Cell;

    fn board() -> Grid {
        let mut grid = Grid::new(3, 3).unwrap();
        grid.set(Coord::new(0, 0), Cell::owned(1, 100));
        grid.set(Coord::new(1, 1), Cell::owned(1, 100));
        grid.set(Coord::new(2, 2), Cell::owned(2, 100));
        grid.set(Coord::new(1, 2), Cell::obstacle());
        grid
    }

    #[test]
    fn test_parse_mixed_case_and_aliases() {
        let commands = parse_commands("open a1e, A1d\nCLOSE b2L").unwrap();
        assert_eq!(
            commands,
            vec![
                Command::new(Coord::new(0, 0), Direction::East, true),
                Command::new(Coord::new(0, 0), Direction::South, true),
                Command::new(Coord::new(1, 1), Direction::West, false),
            ]
        );
    }

    #[test]
    fn test_parse_collects_all_errors() {
        let errors = parse_commands("SHUT A1E\nOPEN A1X, ZZ\nCLOSE").unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], CommandError::UnknownAction { line: 1, .. }));
        assert!(matches!(errors[1], CommandError::BadToken { line: 2, .. }));
        assert!(matches!(errors[3], CommandError::NoGates { line: 3 }));
    }

    #[test]
    fn test_blank_submission_is_empty() {
        assert_eq!(parse_commands("\n  \n").unwrap(), Vec::new());
    }

    #[test]
    fn test_validate_ownership_and_targets() {
        let grid = board();
        let commands = parse_commands("OPEN A1N, B2E, C3W, D1S").unwrap();
        let errors = validate_commands(&commands, &grid, 1, 10).unwrap_err();
        assert!(errors.contains(&CommandError::TargetOffGrid(GateKey::new(
            Coord::new(0, 0),
            Direction::North
        ))));
        assert!(errors.contains(&CommandError::TargetObstacle(GateKey::new(
            Coord::new(1, 1),
            Direction::East
        ))));
        assert!(errors.contains(&CommandError::NotOwned(Coord::new(2, 2))));
        assert!(errors.contains(&CommandError::OffGrid(Coord::new(3, 0))));
    }

    #[test]
    fn test_duplicate_gate_from_either_side() {
        let mut grid = board();
        grid.set(Coord::new(0, 1), Cell::owned(1, 5));
        let commands = parse_commands("OPEN A1E\nCLOSE A2W").unwrap();
        let errors = validate_commands(&commands, &grid, 1, 10).unwrap_err();
        assert_eq!(
            errors,
            vec![CommandError::Duplicate(GateKey::new(Coord::new(0, 1), Direction::West))]
        );
    }

    #[test]
    fn test_over_limit_rejected_wholesale() {
        let grid = board();
        let err = check_submission("OPEN A1E,A1S,B2N", &grid, 1, 2).unwrap_err();
        assert_eq!(err.errors(), &[CommandError::TooMany { count: 3, limit: 2 }]);
        assert!(err.to_string().contains("allows 2 per tick"));
    }

    #[test]
    fn test_over_limit_reported_with_syntax_errors() {
        let grid = board();
        let err = check_submission("OPEN A1E,A1S,Q", &grid, 1, 2).unwrap_err();
        assert!(err.errors().contains(&CommandError::TooMany { count: 3, limit: 2 }));
    }

    #[test]
    fn test_format_round_trip() {
        let grid = board();
        let commands = check_submission("close b2s\nopen a1e", &grid, 1, 5).unwrap();
        let text = format_commands(&commands);
        assert_eq!(text, "OPEN A1E\nCLOSE B2S");
        assert_eq!(parse_commands(&text).unwrap().len(), 2);
    }
}
