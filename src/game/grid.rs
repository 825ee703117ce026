//! Grid cells, directions and locations.

use std::fmt;
use std::str::FromStr;

use crate::game::PlayerId;

/// Largest quantity a cell may hold once a tick has settled.
pub const MAX_QUANTITY: u32 = 1000;

/// Maximum number of rows (one letter per row).
pub const MAX_ROWS: u16 = 26;

/// Maximum number of columns (two decimal digits).
pub const MAX_COLS: u16 = 99;

/// A coordinate on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Coord {
    /// Row (0 = `A`).
    pub row: u16,
    /// Column (0-based, written 1-based).
    pub col: u16,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[allow(clippy::cast_possible_truncation)]
        let letter = char::from(b'A' + (self.row % MAX_ROWS) as u8);
        write!(f, "{letter}{}", self.col + 1)
    }
}

/// Error returned when a location or direction cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The text was not of the form `A1`.
    #[error("'{0}' is not a location (expected a row letter and a column number, e.g. B3)")]
    Malformed(String),
    /// The direction letter is unknown.
    #[error("'{0}' is not a direction (use N/S/E/W or U/D/R/L)")]
    UnknownDirection(char),
}

impl FromStr for Coord {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LocationError::Malformed(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(malformed)?.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(malformed());
        }
        let digits = chars.as_str();
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let col: u16 = digits.parse().map_err(|_| malformed())?;
        if col == 0 {
            return Err(malformed());
        }
        Ok(Self::new(u16::from(letter as u8 - b'A'), col - 1))
    }
}

/// One of the four gate directions of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Towards row - 1.
    North,
    /// Towards row + 1.
    South,
    /// Towards col + 1.
    East,
    /// Towards col - 1.
    West,
}

/// Per-direction constants: opposite, row delta, column delta.
const DIRECTION_TABLE: [(Direction, i8, i8); 4] = [
    (Direction::South, -1, 0),
    (Direction::North, 1, 0),
    (Direction::West, 0, 1),
    (Direction::East, 0, -1),
];

impl Direction {
    /// All directions, in gate-array order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Index into a cell's gate array.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The direction pointing back.
    #[must_use]
    pub const fn opposite(self) -> Direction {
        DIRECTION_TABLE[self.index()].0
    }

    /// Row step.
    #[must_use]
    pub const fn row_delta(self) -> i8 {
        DIRECTION_TABLE[self.index()].1
    }

    /// Column step.
    #[must_use]
    pub const fn col_delta(self) -> i8 {
        DIRECTION_TABLE[self.index()].2
    }

    /// Canonical single-letter name.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::South => 'S',
            Direction::East => 'E',
            Direction::West => 'W',
        }
    }

    /// Parse a direction letter, accepting the U/D/R/L aliases.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::UnknownDirection`] for any other letter.
    pub fn from_letter(c: char) -> Result<Self, LocationError> {
        match c.to_ascii_uppercase() {
            'N' | 'U' => Ok(Direction::North),
            'S' | 'D' => Ok(Direction::South),
            'E' | 'R' => Ok(Direction::East),
            'W' | 'L' => Ok(Direction::West),
            _ => Err(LocationError::UnknownDirection(c)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Owner of this cell (None = neutral).
    pub owner: Option<PlayerId>,
    /// Force held in the cell.
    pub quantity: u32,
    /// Obstacles never hold force and never open a gate.
    pub obstacle: bool,
    /// Gate state indexed by [`Direction::index`].
    pub gates: [bool; 4],
}

impl Cell {
    /// An empty neutral cell with all gates closed.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            owner: None,
            quantity: 0,
            obstacle: false,
            gates: [false; 4],
        }
    }

    /// An obstacle cell.
    #[must_use]
    pub const fn obstacle() -> Self {
        Self {
            owner: None,
            quantity: 0,
            obstacle: true,
            gates: [false; 4],
        }
    }

    /// A cell owned by `owner` holding `quantity`.
    #[must_use]
    pub const fn owned(owner: PlayerId, quantity: u32) -> Self {
        Self {
            owner: Some(owner),
            quantity,
            obstacle: false,
            gates: [false; 4],
        }
    }

    /// Whether the gate in `dir` is open.
    #[must_use]
    pub const fn gate(&self, dir: Direction) -> bool {
        self.gates[dir.index()]
    }

    /// Set owner and quantity together.
    pub fn update(&mut self, owner: Option<PlayerId>, quantity: u32) {
        self.owner = owner;
        self.quantity = quantity;
    }

    /// Cap the quantity at `max`.
    pub fn truncate(&mut self, max: u32) {
        self.quantity = self.quantity.min(max);
    }
}

/// Error from a gate mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The gate leads off the grid.
    #[error("gate {0}{1} leads off the grid")]
    OffGrid(Coord, Direction),
    /// One side of the gate is an obstacle.
    #[error("gate {0}{1} touches an obstacle")]
    Obstacle(Coord, Direction),
}

/// The game grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    /// Number of rows.
    rows: u16,
    /// Number of columns.
    cols: u16,
    /// Cells stored in row-major order.
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid of empty neutral cells.
    ///
    /// Returns `None` if a dimension is zero or too large to name.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Option<Self> {
        if rows == 0 || cols == 0 || rows > MAX_ROWS || cols > MAX_COLS {
            return None;
        }

        let size = usize::from(rows) * usize::from(cols);
        Some(Self {
            rows,
            cols,
            cells: vec![Cell::empty(); size],
        })
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// Raw cells in row-major order.
    #[must_use]
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Check if a coordinate is on the grid.
    #[must_use]
    pub const fn in_bounds(&self, coord: Coord) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        self.in_bounds(coord)
            .then(|| usize::from(coord.row) * usize::from(self.cols) + usize::from(coord.col))
    }

    /// Get the cell at `coord`.
    #[must_use]
    pub fn get(&self, coord: Coord) -> Option<&Cell> {
        self.index(coord).map(|idx| &self.cells[idx])
    }

    /// Get the cell at `coord` mutably.
    #[must_use]
    pub fn get_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        self.index(coord).map(|idx| &mut self.cells[idx])
    }

    /// Replace the cell at `coord`.
    ///
    /// Returns `false` if the coordinate is out of bounds.
    pub fn set(&mut self, coord: Coord, cell: Cell) -> bool {
        if let Some(idx) = self.index(coord) {
            self.cells[idx] = cell;
            true
        } else {
            false
        }
    }

    /// The neighboring coordinate in `dir`, if it is on the grid.
    #[must_use]
    pub fn neighbor(&self, coord: Coord, dir: Direction) -> Option<Coord> {
        let row = coord.row.checked_add_signed(i16::from(dir.row_delta()))?;
        let col = coord.col.checked_add_signed(i16::from(dir.col_delta()))?;
        let next = Coord::new(row, col);
        self.in_bounds(next).then_some(next)
    }

    /// Whether the gate at `coord` facing `dir` is open.
    #[must_use]
    pub fn is_gate_open(&self, coord: Coord, dir: Direction) -> bool {
        self.get(coord).is_some_and(|cell| cell.gate(dir))
    }

    /// Open or close a gate on both sides.
    ///
    /// Returns whether the state changed. Closing always succeeds for
    /// on-grid gates; opening fails if either side is an obstacle.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`] if the gate leads off the grid or an open
    /// is requested against an obstacle.
    pub fn set_gate(&mut self, coord: Coord, dir: Direction, open: bool) -> Result<bool, GateError> {
        let other = self
            .neighbor(coord, dir)
            .filter(|_| self.in_bounds(coord))
            .ok_or(GateError::OffGrid(coord, dir))?;
        if open && (self.is_obstacle(coord) || self.is_obstacle(other)) {
            return Err(GateError::Obstacle(coord, dir));
        }
        if self.is_gate_open(coord, dir) == open {
            return Ok(false);
        }
        if let Some(cell) = self.get_mut(coord) {
            cell.gates[dir.index()] = open;
        }
        if let Some(cell) = self.get_mut(other) {
            cell.gates[dir.opposite().index()] = open;
        }
        Ok(true)
    }

    fn is_obstacle(&self, coord: Coord) -> bool {
        self.get(coord).is_some_and(|cell| cell.obstacle)
    }

    /// Iterate over all coordinates and cells.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Cell)> {
        let cols = usize::from(self.cols);
        self.cells.iter().enumerate().map(move |(idx, cell)| {
            #[allow(clippy::cast_possible_truncation)]
            let coord = Coord::new((idx / cols) as u16, (idx % cols) as u16);
            (coord, cell)
        })
    }

    /// Open gates of `coord` paired with the neighbor they lead to.
    pub fn open_gates(&self, coord: Coord) -> impl Iterator<Item = (Direction, Coord)> + '_ {
        Direction::ALL.into_iter().filter_map(move |dir| {
            if self.is_gate_open(coord, dir) {
                self.neighbor(coord, dir).map(|n| (dir, n))
            } else {
                None
            }
        })
    }

    /// Cells owned by `player`.
    pub fn cells_owned_by(&self, player: PlayerId) -> impl Iterator<Item = (Coord, &Cell)> {
        self.iter().filter(move |(_, cell)| cell.owner == Some(player))
    }

    /// Number of cells owned by `player`.
    #[must_use]
    pub fn territory(&self, player: PlayerId) -> usize {
        self.cells_owned_by(player).count()
    }

    /// Total force held by `player` on the grid.
    #[must_use]
    pub fn total_force(&self, player: PlayerId) -> u64 {
        self.cells_owned_by(player)
            .map(|(_, cell)| u64::from(cell.quantity))
            .sum()
    }

    /// Cap every cell at `max`.
    pub fn truncate_all(&mut self, max: u32) {
        for cell in &mut self.cells {
            cell.truncate(max);
        }
    }
}
