//! Persistence and notification.
//!
//! The engine only talks to storage and mail through [`GameStore`] and
//! [`Notifier`]. Two stores are provided: an in-memory one for tests and
//! embedding, and a directory of JSON files for the command line.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::game::{GameState, PlayerId};
use crate::lobby::{GameRecord, LobbyError};

/// Largest game file the file store will read.
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Error from a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No game with this id.
    #[error("game {0} not found")]
    NotFound(String),
    /// Creating a game whose id is taken.
    #[error("game {0} already exists")]
    AlreadyExists(String),
    /// The game ticked since this commit's state was loaded.
    #[error("game {id} moved on to tick {found} (expected {expected})")]
    Conflict {
        /// Game id.
        id: String,
        /// Tick the commit was computed from.
        expected: u32,
        /// Tick found in the store.
        found: u32,
    },
    /// Read or write failed.
    #[error("storage I/O failed: {0}")]
    Io(String),
    /// A stored record could not be read.
    #[error("stored game is unreadable: {0}")]
    Corrupt(String),
    /// A lobby rule rejected the change.
    #[error(transparent)]
    Lobby(#[from] LobbyError),
}

/// Result of one tick, ready to be stored.
#[derive(Debug, Clone)]
pub struct TickCommit {
    /// Tick the state was loaded at.
    pub base_tick: u32,
    /// State after the tick.
    pub state: GameState,
    /// Whether the game ended.
    pub game_over: bool,
    /// Last player standing.
    pub winner: Option<PlayerId>,
    /// Pending submissions the tick played.
    pub consumed: BTreeMap<PlayerId, String>,
    /// When the tick ran.
    pub at: DateTime<Utc>,
}

/// Game persistence.
///
/// Every method is atomic with respect to the others.
pub trait GameStore: Send + Sync {
    /// Ids of all stored games, sorted.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be read.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Load one game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    fn load(&self, id: &str) -> Result<GameRecord, StoreError>;

    /// Store a new game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    fn create(&self, record: &GameRecord) -> Result<(), StoreError>;

    /// Read, change and write back a game in one step.
    ///
    /// Nothing is written if `change` fails.
    ///
    /// # Errors
    ///
    /// Returns the error from `change`, or a [`StoreError`].
    fn modify(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut GameRecord) -> Result<(), LobbyError>,
    ) -> Result<GameRecord, StoreError>;

    /// Replace one player's pending submission, leaving the rest untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the game cannot be read or written.
    fn store_commands(&self, id: &str, player: PlayerId, text: &str) -> Result<(), StoreError> {
        self.modify(id, &mut |record| {
            record.pending.insert(player, text.to_string());
            Ok(())
        })
        .map(|_| ())
    }

    /// Store a tick's outcome and clear the submissions it consumed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the game ticked in the meantime.
    fn commit_tick(&self, id: &str, commit: &TickCommit) -> Result<(), StoreError>;
}

fn apply_commit(record: &mut GameRecord, commit: &TickCommit) -> Result<(), StoreError> {
    if record.tick != commit.base_tick {
        return Err(StoreError::Conflict {
            id: record.id.clone(),
            expected: commit.base_tick,
            found: record.tick,
        });
    }
    record.apply_tick(
        &commit.state,
        commit.winner,
        commit.game_over,
        &commit.consumed,
        commit.at,
    );
    Ok(())
}

/// Games held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: RwLock<BTreeMap<String, GameRecord>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.games.read().keys().cloned().collect())
    }

    fn load(&self, id: &str) -> Result<GameRecord, StoreError> {
        self.games
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn create(&self, record: &GameRecord) -> Result<(), StoreError> {
        let mut games = self.games.write();
        if games.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        games.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn modify(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut GameRecord) -> Result<(), LobbyError>,
    ) -> Result<GameRecord, StoreError> {
        let mut games = self.games.write();
        let stored = games
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut record = stored.clone();
        change(&mut record)?;
        *stored = record.clone();
        Ok(record)
    }

    fn commit_tick(&self, id: &str, commit: &TickCommit) -> Result<(), StoreError> {
        let mut games = self.games.write();
        let stored = games
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut record = stored.clone();
        apply_commit(&mut record, commit)?;
        *stored = record;
        Ok(())
    }
}

/// One JSON file per game in a directory.
///
/// Writes go to a temporary file that is renamed over the old one, so a
/// crash never leaves a half-written game behind.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a store directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Io(format!("{}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(&self, id: &str) -> Result<GameRecord, StoreError> {
        let path = self.path(id);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return Err(StoreError::Corrupt(format!(
                "{} is {} bytes",
                path.display(),
                metadata.len()
            )));
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))
    }

    fn write(&self, record: &GameRecord) -> Result<(), StoreError> {
        let path = self.path(&record.id);
        let temp = self.dir.join(format!(".{}.json.tmp", record.id));
        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        fs::write(&temp, contents)
            .map_err(|e| StoreError::Io(format!("{}: {e}", temp.display())))?;
        fs::rename(&temp, &path)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))?;
        debug!("Saved game {} to {}", record.id, path.display());
        Ok(())
    }
}

impl GameStore for FileStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| StoreError::Io(format!("{}: {e}", self.dir.display())))?;
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let id = name.strip_suffix(".json")?;
                (!id.starts_with('.')).then(|| id.to_string())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<GameRecord, StoreError> {
        self.read(id)
    }

    fn create(&self, record: &GameRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        if self.path(&record.id).exists() {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        self.write(record)?;
        info!("Created game {}", record.id);
        Ok(())
    }

    fn modify(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut GameRecord) -> Result<(), LobbyError>,
    ) -> Result<GameRecord, StoreError> {
        let _guard = self.lock.lock();
        let mut record = self.read(id)?;
        change(&mut record)?;
        self.write(&record)?;
        Ok(record)
    }

    fn commit_tick(&self, id: &str, commit: &TickCommit) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut record = self.read(id)?;
        apply_commit(&mut record, commit)?;
        self.write(&record)
    }
}

/// A plain-text message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

/// Error delivering a notice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not notify {to}: {reason}")]
pub struct NotifyError {
    /// Recipient.
    pub to: String,
    /// What went wrong.
    pub reason: String,
}

/// Outbound message delivery.
pub trait Notifier: Send + Sync {
    /// Deliver one notice.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] if delivery fails.
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(to = %notice.to, subject = %notice.subject, "Notice");
        debug!("{}", notice.body);
        Ok(())
    }
}

/// Keeps notices in memory.
#[derive(Debug, Default)]
pub struct MailboxNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl MailboxNotifier {
    /// Empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything delivered so far.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Notices delivered to `to`.
    #[must_use]
    pub fn for_recipient(&self, to: &str) -> Vec<Notice> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.to == to)
            .cloned()
            .collect()
    }
}

impl Notifier for MailboxNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::lobby::GameSettings;

    fn now() -> DateTime<Utc> {
        "2026-01-10T09:00:00Z".parse().unwrap()
    }

    fn started(id: &str) -> GameRecord {
        let config = SimConfig::default();
        let mut record = GameRecord::new(id, GameSettings::default(), now()).unwrap();
        record.join("a@example.org", now(), &config).unwrap();
        record.join("b@example.org", now(), &config).unwrap();
        record
    }

    fn commit_for(record: &GameRecord) -> TickCommit {
        let mut state = record.load_state().unwrap();
        state.tick += 1;
        TickCommit {
            base_tick: record.tick,
            state,
            game_over: false,
            winner: None,
            consumed: record.pending.clone(),
            at: now(),
        }
    }

    fn exercise(store: &dyn GameStore) {
        let record = started("g1");
        store.create(&record).unwrap();
        assert_eq!(
            store.create(&record),
            Err(StoreError::AlreadyExists("g1".to_string()))
        );
        assert_eq!(store.list().unwrap(), vec!["g1".to_string()]);
        assert_eq!(store.load("g1").unwrap(), record);
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));

        store.store_commands("g1", 1, "OPEN A1E").unwrap();
        let loaded = store.load("g1").unwrap();
        let commit = commit_for(&loaded);

        // Re-submitted after the tick loaded its state
        store.store_commands("g1", 1, "CLOSE A1E").unwrap();
        store.commit_tick("g1", &commit).unwrap();
        let after = store.load("g1").unwrap();
        assert_eq!(after.tick, 1);
        assert_eq!(after.pending.get(&1).map(String::as_str), Some("CLOSE A1E"));

        // Committing the same tick twice is refused
        assert!(matches!(
            store.commit_tick("g1", &commit),
            Err(StoreError::Conflict { expected: 0, found: 1, .. })
        ));

        let failed = store.modify("g1", &mut |r| {
            r.tick = 99;
            Err(LobbyError::NotOpen(r.id.clone()))
        });
        assert!(matches!(failed, Err(StoreError::Lobby(_))));
        assert_eq!(store.load("g1").unwrap().tick, 1);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        exercise(&store);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["g1.json".to_string()]);
    }

    #[test]
    fn test_file_store_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert!(matches!(store.load("bad"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_mailbox() {
        let mailbox = MailboxNotifier::new();
        let notice = Notice {
            to: "a@example.org".to_string(),
            subject: "Tick 1".to_string(),
            body: "hello".to_string(),
        };
        mailbox.notify(&notice).unwrap();
        LogNotifier.notify(&notice).unwrap();
        assert_eq!(mailbox.for_recipient("a@example.org"), vec![notice.clone()]);
        assert_eq!(mailbox.take(), vec![notice]);
        assert!(mailbox.take().is_empty());
    }
}
