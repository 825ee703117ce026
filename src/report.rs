//! Human-readable text for players: board maps and tick reports.

use crate::game::{Board, Coord, Direction, GameState, MergeReport, PlayerId, TickOutcome, Tier};

/// Width of one rendered cell, without its gate column.
const CELL_WIDTH: usize = 7;

fn cell_text(board: &Board, coord: Coord) -> String {
    let Some(cell) = board.grid.get(coord) else {
        return String::new();
    };
    let geyser = board.geysers.get(coord).map_or(' ', Tier::letter);
    if cell.obstacle {
        return "#####".to_string();
    }
    match cell.owner {
        Some(owner) => format!("{owner}:{:<4}{geyser}", cell.quantity),
        None if cell.quantity > 0 => format!(".:{:<4}{geyser}", cell.quantity),
        None => format!("  .  {geyser}"),
    }
}

/// Render the board as a text map.
///
/// Each cell shows `owner:quantity` and a geyser letter; `-` joins cells
/// with an open East gate and `|` marks an open South gate.
#[must_use]
pub fn render_board(board: &Board) -> String {
    let grid = &board.grid;
    let mut output = String::new();

    output.push_str("   ");
    for col in 0..grid.cols() {
        output.push_str(&format!(" {:<width$} ", col + 1, width = CELL_WIDTH));
    }
    output.push('\n');

    for row in 0..grid.rows() {
        let label = Coord::new(row, 0).to_string().chars().next().unwrap_or(' ');
        output.push_str(&format!("{label:<3}"));
        for col in 0..grid.cols() {
            let coord = Coord::new(row, col);
            output.push_str(&format!(" {:<width$}", cell_text(board, coord), width = CELL_WIDTH));
            output.push(if grid.is_gate_open(coord, Direction::East) { '-' } else { ' ' });
        }
        output.truncate(output.trim_end().len());
        output.push('\n');

        if row + 1 < grid.rows() {
            let mut gates = String::from("   ");
            for col in 0..grid.cols() {
                let open = grid.is_gate_open(Coord::new(row, col), Direction::South);
                gates.push_str(&format!("    {}    ", if open { '|' } else { ' ' }));
            }
            let gates = gates.trim_end();
            if !gates.is_empty() {
                output.push_str(gates);
            }
            output.push('\n');
        }
    }

    output
}

fn join_keys<T: ToString>(keys: &[T]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Summarize a command merge, one line per non-empty category.
#[must_use]
pub fn merge_summary(report: &MergeReport) -> String {
    let mut output = String::new();
    for (label, keys) in [
        ("Opened", &report.opened),
        ("Closed", &report.closed),
        ("Conflicting (unchanged)", &report.conflicts),
        ("Skipped", &report.skipped),
    ] {
        if !keys.is_empty() {
            output.push_str(&format!("{label}: {}\n", join_keys(keys)));
        }
    }
    if output.is_empty() {
        output.push_str("No gate changes.\n");
    }
    output
}

/// The tick report sent to a player (or to an observer with `None`).
#[must_use]
pub fn tick_report(state: &GameState, outcome: &TickOutcome, reader: Option<PlayerId>) -> String {
    let board = &state.board;
    let mut output = String::new();

    output.push_str(&format!("Tick {}\n\n", outcome.tick));

    if let Some(id) = reader {
        let cells = board.grid.territory(id);
        let force = board.grid.total_force(id);
        output.push_str(&format!("You hold {cells} cells with {force} force.\n"));
        if outcome.eliminated.contains(&id) {
            output.push_str("You have been eliminated.\n");
        }
        output.push('\n');
    }

    output.push_str(&merge_summary(&outcome.summary.merge));
    output.push('\n');

    if !outcome.summary.skirmishes.is_empty() {
        output.push_str("Combat:\n");
        for skirmish in &outcome.summary.skirmishes {
            let sides: Vec<String> = skirmish
                .contestants
                .iter()
                .map(|c| format!("{}={}", owner_name(c.owner), c.force))
                .collect();
            let result = match skirmish.result.winner {
                Some(w) => format!("player {w} holds with {}", skirmish.result.remaining),
                None if skirmish.result.remaining > 0 => {
                    format!("stays neutral with {}", skirmish.result.remaining)
                }
                None => "everyone wiped out".to_string(),
            };
            output.push_str(&format!("  {}: {} -> {result}\n", skirmish.coord, sides.join(" ")));
        }
        output.push('\n');
    }

    for id in &outcome.eliminated {
        output.push_str(&format!("Player {id} was eliminated.\n"));
    }
    if outcome.game_over {
        match outcome.winner {
            Some(w) => output.push_str(&format!("Game over: player {w} wins.\n")),
            None => output.push_str("Game over: no one is left.\n"),
        }
    }
    if !outcome.eliminated.is_empty() || outcome.game_over {
        output.push('\n');
    }

    output.push_str(&render_board(board));
    output
}

fn owner_name(owner: Option<PlayerId>) -> String {
    owner.map_or_else(|| "neutral".to_string(), |id| format!("P{id}"))
}
