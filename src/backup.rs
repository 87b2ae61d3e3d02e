//! Backup orchestration tying the exporters and state together.

use crate::config::BackupConfig;
use crate::entities::{Entity, EVENTS, SNAPSHOT_ENTITIES};
use crate::error::Result;
use crate::export::{export_incremental, export_table, RowSource};
use crate::source::RevisionedStore;
use crate::state::{self, BackupState};
use crate::types::Cancellation;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The store revision matched the last export; nothing was written.
    ShortCircuited(BackupState),
    /// Every entity was exported and the state file rewritten.
    Completed(BackupState),
}

impl RunOutcome {
    pub fn state(&self) -> &BackupState {
        match self {
            RunOutcome::ShortCircuited(state) | RunOutcome::Completed(state) => state,
        }
    }

    pub fn into_state(self) -> BackupState {
        match self {
            RunOutcome::ShortCircuited(state) | RunOutcome::Completed(state) => state,
        }
    }

    pub fn is_short_circuited(&self) -> bool {
        matches!(self, RunOutcome::ShortCircuited(_))
    }
}

/// Exports a store into a backup directory of JSONL files.
///
/// One run:
/// 1. load `backup_state.json` (zero state if missing)
/// 2. unless forced, stop if the store revision equals the recorded one
/// 3. probe once for the shadow table; the answer applies to every entity
/// 4. rewrite each full-snapshot entity file in a fixed order
/// 5. append new rows of the event stream past the watermark
/// 6. record the store revision (read again, it may have moved) and time
/// 7. save the state file
///
/// Any error aborts the run before step 7, so the state file keeps pointing
/// at the last run that fully completed.
pub struct BackupExporter<S> {
    store: S,
    config: BackupConfig,
}

impl<S: RevisionedStore> BackupExporter<S> {
    pub fn new(store: S, config: BackupConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    /// Resolve (and create) the backup directory.
    pub fn backup_dir(&self) -> Result<PathBuf> {
        self.config.resolve_dir()
    }

    /// Current persisted state, without exporting anything.
    pub fn load_state(&self) -> Result<BackupState> {
        state::load(&self.backup_dir()?)
    }

    /// Run one export. `force` skips change detection.
    pub fn run(&self, ctx: &Cancellation, force: bool) -> Result<RunOutcome> {
        let dir = self.backup_dir()?;
        let mut state = state::load(&dir)?;

        if !force {
            let current = self.store.current_revision(ctx)?;
            if state.has_revision() && current == state.last_revision {
                debug!(
                    revision = truncate_hash(&current),
                    "no changes since last backup"
                );
                return Ok(RunOutcome::ShortCircuited(state));
            }
        }

        let with_shadow = self.probe_shadow(ctx)?;

        for spec in &SNAPSHOT_ENTITIES {
            let source = RowSource::snapshot(spec, with_shadow);
            let path = dir.join(spec.entity.file_name());
            let n = export_table(&self.store, ctx, &source, &path)
                .map_err(|e| e.in_entity(spec.entity.name()))?;
            state.counts.set(spec.entity, n);
        }

        let n = export_incremental(
            &self.store,
            ctx,
            &EVENTS,
            with_shadow,
            &dir,
            self.config.append_mode,
            &mut state,
        )
        .map_err(|e| e.in_entity(Entity::Events.name()))?;
        state.counts.add(Entity::Events, n);

        state.last_revision = self.store.current_revision(ctx)?;
        state.timestamp = Utc::now();
        state::save(&dir, &state)?;

        info!(
            revision = truncate_hash(&state.last_revision),
            watermark = state.last_watermark,
            rows = state.counts.total(),
            new_events = n,
            "backup complete"
        );
        Ok(RunOutcome::Completed(state))
    }

    /// Whether the shadow table exists. A failed probe counts as "no".
    fn probe_shadow(&self, ctx: &Cancellation) -> Result<bool> {
        let table = &self.config.shadow_probe_table;
        match self.store.table_exists(ctx, table) {
            Ok(exists) => {
                if exists {
                    debug!(table = %table, "merging shadow tables");
                }
                Ok(exists)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!(table = %table, error = %e, "shadow table probe failed, exporting without it");
                Ok(false)
            }
        }
    }
}

/// Run one export and return the resulting state.
pub fn run_backup_export<S: RevisionedStore>(
    store: S,
    config: BackupConfig,
    ctx: &Cancellation,
    force: bool,
) -> Result<BackupState> {
    BackupExporter::new(store, config)
        .run(ctx, force)
        .map(RunOutcome::into_state)
}

/// First 8 characters of a revision hash, for logs.
pub fn truncate_hash(hash: &str) -> &str {
    match hash.char_indices().nth(8) {
        Some((i, _)) => &hash[..i],
        None => hash,
    }
}
