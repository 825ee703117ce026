//! Game records and their lifecycle.
//!
//! A game is created `Open`, fills its seats, and starts as soon as the last
//! seat is taken. From then on the runner advances it one tick at a time
//! until a single player is left.

pub mod mapgen;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::game::{
    check_submission, format_commands, parse_commands, Command, CommandError, GameState, Player,
    PlayerId, SubmitError, MAX_COLS, MAX_PLAYERS, MAX_ROWS,
};
use crate::notation::{EncodedBoard, NotationError};
use crate::schedule::{self, ScheduleError};

pub use mapgen::{generate_board, MapGenError, HOME_QUANTITY};

/// Where a game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Waiting for players
    Open,
    /// Ticking
    InProgress,
    /// Finished
    Complete,
}

/// Per-game settings chosen at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Seats to fill before the game starts.
    pub required_players: usize,
    /// Ticks per day (1-4).
    pub ticks_per_day: u8,
    /// IANA timezone the tick hours are read in.
    pub timezone: String,
    /// Most gate commands a player may submit per tick.
    pub command_limit: usize,
    /// Board rows.
    pub rows: u16,
    /// Board columns.
    pub cols: u16,
    /// Board generation seed.
    pub seed: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            required_players: 2,
            ticks_per_day: 2,
            timezone: "UTC".to_string(),
            command_limit: 10,
            rows: 10,
            cols: 10,
            seed: 0,
        }
    }
}

impl GameSettings {
    /// Check the settings.
    ///
    /// # Errors
    ///
    /// Returns [`LobbyError::Settings`] or [`LobbyError::Schedule`] naming
    /// the first bad value.
    pub fn validate(&self) -> Result<(), LobbyError> {
        if !(2..=MAX_PLAYERS).contains(&self.required_players) {
            return Err(LobbyError::Settings(format!(
                "players must be 2-{MAX_PLAYERS}, got {}",
                self.required_players
            )));
        }
        if self.command_limit == 0 {
            return Err(LobbyError::Settings("command limit must be at least 1".to_string()));
        }
        if !(3..=MAX_ROWS).contains(&self.rows) || !(3..=MAX_COLS).contains(&self.cols) {
            return Err(LobbyError::Settings(format!(
                "board must be 3-{MAX_ROWS} rows by 3-{MAX_COLS} columns, got {}x{}",
                self.rows, self.cols
            )));
        }
        schedule::slot_hours(self.ticks_per_day)?;
        schedule::parse_timezone(&self.timezone)?;
        Ok(())
    }
}

/// Error from a lobby operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Game ids are used as file names.
    #[error("'{0}' is not a valid game id (use letters, digits, '-' and '_')")]
    InvalidId(String),
    /// Bad game settings.
    #[error("invalid settings: {0}")]
    Settings(String),
    /// Scheduling settings rejected.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// Joining a game that already started.
    #[error("game {0} is not open for joining")]
    NotOpen(String),
    /// Joining twice.
    #[error("{0} has already joined")]
    AlreadyJoined(String),
    /// Submitting to a game that is not running.
    #[error("game {0} is not in progress")]
    NotInProgress(String),
    /// Address is not seated in the game.
    #[error("{0} is not playing in this game")]
    UnknownPlayer(String),
    /// Seated but eliminated.
    #[error("{0} has been eliminated")]
    Eliminated(String),
    /// Board could not be generated.
    #[error(transparent)]
    MapGen(#[from] MapGenError),
    /// Stored board is corrupt.
    #[error(transparent)]
    Notation(#[from] NotationError),
    /// Commands rejected.
    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Everything stored about one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Unique id.
    pub id: String,
    /// Lifecycle state.
    pub status: GameStatus,
    /// Creation settings.
    pub settings: GameSettings,
    /// Seated players, in seat order.
    pub players: Vec<Player>,
    /// When the game was created.
    pub created_at: DateTime<Utc>,
    /// Last tick, or the start time before the first tick.
    pub last_tick: Option<DateTime<Utc>>,
    /// Ticks played.
    pub tick: u32,
    /// Persisted board.
    pub board: EncodedBoard,
    /// Each player's latest accepted submission, in canonical form.
    pub pending: BTreeMap<PlayerId, String>,
    /// Last player standing.
    pub winner: Option<PlayerId>,
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl GameRecord {
    /// Create an open game.
    ///
    /// # Errors
    ///
    /// Returns a [`LobbyError`] for a bad id or invalid settings.
    pub fn new(
        id: impl Into<String>,
        settings: GameSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, LobbyError> {
        let id = id.into();
        if !valid_id(&id) {
            return Err(LobbyError::InvalidId(id));
        }
        settings.validate()?;
        Ok(Self {
            id,
            status: GameStatus::Open,
            settings,
            players: Vec::new(),
            created_at: now,
            last_tick: None,
            tick: 0,
            board: EncodedBoard::default(),
            pending: BTreeMap::new(),
            winner: None,
        })
    }

    /// Seat of `address`, if seated.
    #[must_use]
    pub fn player_id(&self, address: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.address.eq_ignore_ascii_case(address.trim()))
            .map(|p| p.id)
    }

    /// Seat a player. Filling the last seat generates the board and starts
    /// the game at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`LobbyError`] if the game is not open, the address is
    /// already seated, or the board cannot be generated.
    pub fn join(
        &mut self,
        address: &str,
        now: DateTime<Utc>,
        config: &SimConfig,
    ) -> Result<PlayerId, LobbyError> {
        if self.status != GameStatus::Open {
            return Err(LobbyError::NotOpen(self.id.clone()));
        }
        if self.player_id(address).is_some() {
            return Err(LobbyError::AlreadyJoined(address.to_string()));
        }

        // Seats are 1-indexed and never exceed MAX_PLAYERS
        #[allow(clippy::cast_possible_truncation)]
        let id = (self.players.len() + 1) as PlayerId;
        self.players.push(Player::new(id, address.trim()));

        if self.players.len() >= self.settings.required_players {
            self.start(now, config).inspect_err(|_| {
                self.players.pop();
            })?;
        }
        Ok(id)
    }

    fn start(&mut self, now: DateTime<Utc>, config: &SimConfig) -> Result<(), LobbyError> {
        let board = generate_board(
            self.settings.seed,
            self.settings.rows,
            self.settings.cols,
            self.players.len(),
            config,
        )?;
        self.board = EncodedBoard::encode(&board);
        self.status = GameStatus::InProgress;
        self.last_tick = Some(now);
        tracing::info!(game = %self.id, players = self.players.len(), "Game started");
        Ok(())
    }

    /// Decode the stored board into a playable state.
    ///
    /// # Errors
    ///
    /// Returns a [`NotationError`] if the stored board is corrupt.
    pub fn load_state(&self) -> Result<GameState, NotationError> {
        Ok(GameState::new(
            self.board.decode()?,
            self.players.clone(),
            self.tick,
        ))
    }

    /// Check a submission from `address` against the current board.
    ///
    /// Returns the seat and the canonical text to store in its pending
    /// slot. Nothing is changed here; storing is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns a [`LobbyError`] if the game is not running, the sender is
    /// not an active player, or any command is invalid.
    pub fn prepare_submission(
        &self,
        address: &str,
        text: &str,
    ) -> Result<(PlayerId, String), LobbyError> {
        if self.status != GameStatus::InProgress {
            return Err(LobbyError::NotInProgress(self.id.clone()));
        }
        let player = self
            .players
            .iter()
            .find(|p| p.address.eq_ignore_ascii_case(address.trim()))
            .ok_or_else(|| LobbyError::UnknownPlayer(address.to_string()))?;
        if !player.alive() {
            return Err(LobbyError::Eliminated(address.to_string()));
        }
        let board = self.board.decode()?;
        let commands = check_submission(
            text,
            &board.grid,
            player.id,
            self.settings.command_limit,
        )?;
        Ok((player.id, format_commands(&commands)))
    }

    /// Parse every pending submission.
    ///
    /// # Errors
    ///
    /// Returns the seat and errors of the first stored submission that no
    /// longer parses.
    pub fn pending_commands(
        &self,
    ) -> Result<BTreeMap<PlayerId, Vec<Command>>, (PlayerId, Vec<CommandError>)> {
        self.pending
            .iter()
            .map(|(&id, text)| parse_commands(text).map(|c| (id, c)).map_err(|e| (id, e)))
            .collect()
    }

    /// Store a tick's result and clear the submissions it consumed.
    pub fn apply_tick(
        &mut self,
        state: &GameState,
        winner: Option<PlayerId>,
        game_over: bool,
        consumed: &BTreeMap<PlayerId, String>,
        now: DateTime<Utc>,
    ) {
        self.board = EncodedBoard::encode(&state.board);
        self.players.clone_from(&state.players);
        self.tick = state.tick;
        self.last_tick = Some(now);
        if game_over {
            self.status = GameStatus::Complete;
            self.winner = winner;
        }
        for (id, text) in consumed {
            if self.pending.get(id) == Some(text) {
                self.pending.remove(id);
            }
        }
    }

    /// Parsed timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::UnknownTimezone`] if the stored name is bad.
    pub fn timezone(&self) -> Result<Tz, ScheduleError> {
        schedule::parse_timezone(&self.settings.timezone)
    }

    /// When the game ticks next. `None` unless it is in progress.
    ///
    /// # Errors
    ///
    /// Returns a [`ScheduleError`] if the schedule settings are bad.
    pub fn next_tick(&self) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        match (self.status, self.last_tick) {
            (GameStatus::InProgress, Some(last)) => Ok(Some(schedule::next_tick(
                last,
                self.timezone()?,
                self.settings.ticks_per_day,
            )?)),
            _ => Ok(None),
        }
    }

    /// Whether the game should tick at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScheduleError`] if the schedule settings are bad.
    pub fn is_due(&self, now: DateTime<Utc>) -> Result<bool, ScheduleError> {
        match (self.status, self.last_tick) {
            (GameStatus::InProgress, Some(last)) => {
                schedule::is_due(last, self.timezone()?, self.settings.ticks_per_day, now)
            }
            _ => Ok(false),
        }
    }
}
