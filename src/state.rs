//! Persistent backup state: revision, watermark and row counts.

use crate::entities::Entity;
use crate::error::{BackupError, Result};
use crate::fs::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// State file name inside the backup directory.
pub const STATE_FILE: &str = "backup_state.json";

/// Last known row counts per entity. Informational only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub issues: u64,
    pub events: u64,
    pub comments: u64,
    pub dependencies: u64,
    pub labels: u64,
    pub config: u64,
}

impl Counts {
    pub fn get(&self, entity: Entity) -> u64 {
        match entity {
            Entity::Issues => self.issues,
            Entity::Events => self.events,
            Entity::Comments => self.comments,
            Entity::Dependencies => self.dependencies,
            Entity::Labels => self.labels,
            Entity::Config => self.config,
        }
    }

    fn slot(&mut self, entity: Entity) -> &mut u64 {
        match entity {
            Entity::Issues => &mut self.issues,
            Entity::Events => &mut self.events,
            Entity::Comments => &mut self.comments,
            Entity::Dependencies => &mut self.dependencies,
            Entity::Labels => &mut self.labels,
            Entity::Config => &mut self.config,
        }
    }

    /// Overwrite a count (full-snapshot entities).
    pub fn set(&mut self, entity: Entity, n: u64) {
        *self.slot(entity) = n;
    }

    /// Accumulate a count (the incremental stream).
    pub fn add(&mut self, entity: Entity, n: u64) {
        *self.slot(entity) += n;
    }

    pub fn total(&self) -> u64 {
        self.issues + self.events + self.comments + self.dependencies + self.labels + self.config
    }
}

/// What the last successful export recorded.
///
/// The zero value (empty revision, watermark 0) means "never exported".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupState {
    /// Store revision at the end of the last completed export.
    pub last_revision: String,
    /// Highest incremental-stream key exported so far.
    pub last_watermark: i64,
    /// When the last completed export finished (UTC).
    pub timestamp: DateTime<Utc>,
    pub counts: Counts,
}

impl BackupState {
    /// Whether a completed export has recorded a revision.
    pub fn has_revision(&self) -> bool {
        !self.last_revision.is_empty()
    }

    /// Raise the watermark; it never moves backwards.
    pub fn advance_watermark(&mut self, key: i64) {
        self.last_watermark = self.last_watermark.max(key);
    }
}

pub fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE)
}

/// Read the state file, or return the zero state when there is none.
pub fn load(dir: &Path) -> Result<BackupState> {
    let data = match fs::read(state_path(dir)) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BackupState::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&data)
        .map_err(|e| BackupError::Deserialization(format!("failed to parse backup state: {e}")))
}

/// Atomically rewrite the state file as 2-space indented JSON.
///
/// Must run after every entity file has been written, so the state never
/// claims progress that is not on disk.
pub fn save(dir: &Path, state: &BackupState) -> Result<()> {
    let data = serde_json::to_vec_pretty(state)?;
    write_atomic(state_path(dir), &data)
}
