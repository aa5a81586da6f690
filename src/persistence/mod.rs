//! Roster storage
//!
//! The simulation never touches storage on its own. Drivers call
//! [`RosterStore::load`] at startup and [`RosterStore::save`] after a run.
//!
//! Files hold a versioned JSON envelope; a temp file is written first and
//! renamed over the old save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roster::Roster;

/// Current envelope version
pub const ROSTER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("roster storage I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("roster file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("roster version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    roster: Roster,
}

/// Somewhere a roster can be kept between sessions
pub trait RosterStore {
    /// Load the saved roster, or `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<Roster>, PersistenceError>;
    fn save(&mut self, roster: &Roster) -> Result<(), PersistenceError>;

    /// Load the saved roster, starting fresh if none exists
    fn load_or_default(&self) -> Result<Roster, PersistenceError> {
        Ok(self.load()?.unwrap_or_default())
    }
}

/// Roster kept as a JSON file on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl RosterStore for JsonFileStore {
    fn load(&self) -> Result<Option<Roster>, PersistenceError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("No roster at {}, starting fresh", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let envelope: Envelope = serde_json::from_str(&json)?;
        if envelope.version > ROSTER_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: envelope.version,
                supported: ROSTER_VERSION,
            });
        }
        let roster = envelope.roster.normalized();
        log::info!("Loaded roster ({} heroes unlocked)", roster.unlocked);
        Ok(Some(roster))
    }

    fn save(&mut self, roster: &Roster) -> Result<(), PersistenceError> {
        let envelope = Envelope {
            version: ROSTER_VERSION,
            roster: roster.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::info!("Roster saved to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and tools
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Option<Roster>,
    /// Number of successful saves
    pub saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(roster: Roster) -> Self {
        Self {
            saved: Some(roster),
            saves: 0,
        }
    }
}

impl RosterStore for MemoryStore {
    fn load(&self) -> Result<Option<Roster>, PersistenceError> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, roster: &Roster) -> Result<(), PersistenceError> {
        self.saved = Some(roster.clone());
        self.saves += 1;
        Ok(())
    }
}
