//! Crate-level error type.
//!
//! Each module has its own error enum; [`Error`] wraps them all for callers
//! that drive several modules at once.

use crate::config::ConfigError;
use crate::game::{GateError, LocationError, SubmitError};
use crate::lobby::LobbyError;
use crate::notation::NotationError;
use crate::runner::TickError;
use crate::schedule::ScheduleError;
use crate::store::{NotifyError, StoreError};

/// Any error the crate can return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Bad simulation settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Bad cell location.
    #[error(transparent)]
    Location(#[from] LocationError),
    /// Bad gate change.
    #[error(transparent)]
    Gate(#[from] GateError),
    /// Rejected command submission.
    #[error(transparent)]
    Submit(#[from] SubmitError),
    /// Corrupt board text.
    #[error(transparent)]
    Notation(#[from] NotationError),
    /// Scheduling failure.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// Lobby rule violated.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Delivery failure.
    #[error(transparent)]
    Notify(#[from] NotifyError),
    /// Tick aborted.
    #[error(transparent)]
    Tick(#[from] TickError),
}

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Coord;

    #[test]
    fn test_conversions_keep_message() {
        let err: Error = LobbyError::NotOpen("g1".to_string()).into();
        assert_eq!(err.to_string(), "game g1 is not open for joining");

        let err: Error = StoreError::NotFound("g2".to_string()).into();
        assert!(matches!(err, Error::Store(_)));

        let err: Error = TickError::Invariant(Vec::new()).into();
        assert_eq!(err.to_string(), "tick broke 0 board invariant(s)");

        let parsed: std::result::Result<Coord, _> = "A0".parse();
        let err: Error = parsed.unwrap_err().into();
        assert!(matches!(err, Error::Location(_)));
    }
}
