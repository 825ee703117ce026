//! Text notation for persisted boards.
//!
//! A board is stored as four strings:
//!
//! ```text
//! board     250:1:OC,0:0:CC|X,40:2:CC        rows '|', cells ','
//! geysers   A1:H,B2:M                        location:tier
//! momentum  A1:E:200;A2:W:200                location:direction:value
//! pressure  0,12;0,0                         rows ';', values ','
//! ```
//!
//! A cell is `quantity:owner:EG SG` (owner 0 is neutral, each gate `O` or
//! `C`) or `X` for an obstacle. Only the East and South gates are written;
//! North and West are restored from the neighbor when loading.

use serde::{Deserialize, Serialize};

use crate::game::{
    Board, Cell, Coord, Direction, GateError, GateKey, Gates, Geysers, Grid, LocationError,
    PlayerId, Pressure, Tier, MAX_PLAYERS,
};

/// Error decoding persisted notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotationError {
    /// A required field was empty.
    #[error("{0} is empty")]
    Empty(&'static str),
    /// Grid dimensions out of range.
    #[error("board of {rows}x{cols} cells is not supported")]
    Size {
        /// Rows found.
        rows: usize,
        /// Columns found.
        cols: usize,
    },
    /// A row does not have the same number of cells as the first.
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        /// 0-based row.
        row: usize,
        /// Cells in the first row.
        expected: usize,
        /// Cells in this row.
        found: usize,
    },
    /// A cell could not be read.
    #[error("cell {coord} is malformed: '{text}'")]
    BadCell {
        /// Where.
        coord: Coord,
        /// What was there.
        text: String,
    },
    /// A gate in the stored topology cannot exist.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// A location or direction could not be read.
    #[error(transparent)]
    Location(#[from] LocationError),
    /// A location is outside the board.
    #[error("{0} is outside the board")]
    OffBoard(Coord),
    /// A geyser entry could not be read.
    #[error("geyser entry '{0}' is malformed")]
    BadGeyser(String),
    /// A momentum entry could not be read.
    #[error("momentum entry '{0}' is malformed")]
    BadMomentum(String),
    /// Pressure values could not be read or do not match the board.
    #[error("pressure is malformed: {0}")]
    BadPressure(String),
}

/// The four persisted strings of a board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedBoard {
    /// Cells and gates.
    pub board: String,
    /// Geyser placement.
    pub geysers: String,
    /// Directed gate momentum.
    pub momentum: String,
    /// Last tick's inbound flow.
    pub pressure: String,
}

impl EncodedBoard {
    /// Encode a board.
    #[must_use]
    pub fn encode(board: &Board) -> Self {
        Self {
            board: encode_grid(&board.grid),
            geysers: encode_geysers(&board.geysers),
            momentum: encode_momentum(&board.gates),
            pressure: encode_pressure(&board.pressure),
        }
    }

    /// Decode a board.
    ///
    /// # Errors
    ///
    /// Returns a [`NotationError`] describing the first problem found.
    pub fn decode(&self) -> Result<Board, NotationError> {
        let grid = decode_grid(&self.board)?;
        let geysers = decode_geysers(&self.geysers, &grid)?;
        let gates = decode_momentum(&self.momentum, &grid)?;
        let pressure = decode_pressure(&self.pressure, &grid)?;
        Ok(Board {
            grid,
            geysers,
            gates,
            pressure,
        })
    }
}

const fn gate_letter(open: bool) -> char {
    if open { 'O' } else { 'C' }
}

/// Encode cells and gates.
#[must_use]
pub fn encode_grid(grid: &Grid) -> String {
    let mut rows = Vec::with_capacity(usize::from(grid.rows()));
    for row in 0..grid.rows() {
        let cells: Vec<String> = (0..grid.cols())
            .map(|col| {
                let cell = grid.get(Coord::new(row, col)).copied().unwrap_or_default();
                if cell.obstacle {
                    "X".to_string()
                } else {
                    format!(
                        "{}:{}:{}{}",
                        cell.quantity,
                        cell.owner.unwrap_or(0),
                        gate_letter(cell.gate(Direction::East)),
                        gate_letter(cell.gate(Direction::South)),
                    )
                }
            })
            .collect();
        rows.push(cells.join(","));
    }
    rows.join("|")
}

/// Decode cells and gates.
///
/// # Errors
///
/// Returns a [`NotationError`] for ragged rows, malformed cells, owners
/// outside the seat range, or gates that lead off the board or into an
/// obstacle.
pub fn decode_grid(text: &str) -> Result<Grid, NotationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NotationError::Empty("board"));
    }

    let rows: Vec<Vec<&str>> = text.split('|').map(|r| r.split(',').collect()).collect();
    let expected = rows.first().map_or(0, Vec::len);
    for (row, cells) in rows.iter().enumerate() {
        if cells.len() != expected {
            return Err(NotationError::Ragged {
                row,
                expected,
                found: cells.len(),
            });
        }
    }

    let size = NotationError::Size {
        rows: rows.len(),
        cols: expected,
    };
    let (Ok(row_count), Ok(col_count)) = (u16::try_from(rows.len()), u16::try_from(expected))
    else {
        return Err(size);
    };
    let mut grid = Grid::new(row_count, col_count).ok_or(size)?;

    let mut open = Vec::new();
    for (r, cells) in (0..row_count).zip(&rows) {
        for (c, text) in (0..col_count).zip(cells) {
            let coord = Coord::new(r, c);
            let (cell, east, south) = decode_cell(text.trim())
                .ok_or_else(|| NotationError::BadCell {
                    coord,
                    text: (*text).to_string(),
                })?;
            grid.set(coord, cell);
            if east {
                open.push(GateKey::new(coord, Direction::East));
            }
            if south {
                open.push(GateKey::new(coord, Direction::South));
            }
        }
    }

    for key in open {
        grid.set_gate(key.coord, key.dir, true)?;
    }
    Ok(grid)
}

fn decode_cell(text: &str) -> Option<(Cell, bool, bool)> {
    if text.eq_ignore_ascii_case("X") {
        return Some((Cell::obstacle(), false, false));
    }
    let mut parts = text.split(':');
    let quantity: u32 = parts.next()?.trim().parse().ok()?;
    let owner: PlayerId = parts.next()?.trim().parse().ok()?;
    let gates = parts.next()?.trim().to_ascii_uppercase();
    if parts.next().is_some() || usize::from(owner) > MAX_PLAYERS {
        return None;
    }
    let mut letters = gates.chars().filter(|c| !c.is_whitespace());
    let east = read_gate(letters.next()?)?;
    let south = read_gate(letters.next()?)?;
    if letters.next().is_some() {
        return None;
    }

    let owner = (owner != 0).then_some(owner);
    let mut cell = Cell::empty();
    cell.update(owner, quantity);
    Some((cell, east, south))
}

fn read_gate(letter: char) -> Option<bool> {
    match letter {
        'O' => Some(true),
        'C' => Some(false),
        _ => None,
    }
}

/// Encode geyser placement.
#[must_use]
pub fn encode_geysers(geysers: &Geysers) -> String {
    geysers
        .iter()
        .map(|(coord, tier)| format!("{coord}:{tier}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode geyser placement against `grid`.
///
/// # Errors
///
/// Returns a [`NotationError`] for malformed entries, unknown tiers or
/// locations off the board.
pub fn decode_geysers(text: &str, grid: &Grid) -> Result<Geysers, NotationError> {
    let mut geysers = Geysers::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let bad = || NotationError::BadGeyser(entry.to_string());
        let (loc, tier) = entry.split_once(':').ok_or_else(bad)?;
        let coord: Coord = loc.trim().parse()?;
        let mut letters = tier.trim().chars();
        let tier = letters
            .next()
            .and_then(Tier::from_letter)
            .filter(|_| letters.next().is_none())
            .ok_or_else(bad)?;
        if !grid.in_bounds(coord) {
            return Err(NotationError::OffBoard(coord));
        }
        if !geysers.place(coord, tier) {
            return Err(bad());
        }
    }
    Ok(geysers)
}

/// Encode directed gate momentum.
#[must_use]
pub fn encode_momentum(gates: &Gates) -> String {
    gates
        .iter()
        .map(|(key, value)| format!("{}:{}:{value}", key.coord, key.dir))
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode directed gate momentum against `grid`.
///
/// # Errors
///
/// Returns a [`NotationError`] for malformed entries or gates off the board.
pub fn decode_momentum(text: &str, grid: &Grid) -> Result<Gates, NotationError> {
    let mut gates = Gates::new();
    for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let bad = || NotationError::BadMomentum(entry.to_string());
        let mut parts = entry.split(':');
        let (Some(loc), Some(dir), Some(value), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(bad());
        };
        let coord: Coord = loc.trim().parse()?;
        let mut letters = dir.trim().chars();
        let dir = match (letters.next(), letters.next()) {
            (Some(letter), None) => Direction::from_letter(letter)?,
            _ => return Err(bad()),
        };
        let value: u32 = value.trim().parse().map_err(|_| bad())?;
        if grid.neighbor(coord, dir).is_none() || !grid.in_bounds(coord) {
            return Err(NotationError::OffBoard(coord));
        }
        gates.set_momentum(GateKey::new(coord, dir), value);
    }
    Ok(gates)
}

/// Encode last tick's pressure.
#[must_use]
pub fn encode_pressure(pressure: &Pressure) -> String {
    (0..pressure.rows())
        .map(|row| {
            pressure
                .row(row)
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Decode pressure against `grid`. An empty string means no flow yet.
///
/// # Errors
///
/// Returns a [`NotationError`] if values are not numbers or the shape does
/// not match the board.
pub fn decode_pressure(text: &str, grid: &Grid) -> Result<Pressure, NotationError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Pressure::zeroed(grid));
    }
    let rows = text
        .split(';')
        .map(|row| {
            row.split(',')
                .map(|v| v.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NotationError::BadPressure(e.to_string()))?;
    let pressure = Pressure::from_rows(rows)
        .ok_or_else(|| NotationError::BadPressure("rows differ in length".to_string()))?;
    if pressure.rows() != grid.rows() || pressure.cols() != grid.cols() {
        return Err(NotationError::BadPressure(format!(
            "{}x{} values for a {}x{} board",
            pressure.rows(),
            pressure.cols(),
            grid.rows(),
            grid.cols()
        )));
    }
    Ok(pressure)
}
