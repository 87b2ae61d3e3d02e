//! # Beads Backup
//!
//! Incremental, crash-safe snapshots of a versioned relational store as
//! newline-delimited JSON files.
//!
//! ## Core Concepts
//!
//! - **Snapshots**: most entities are re-exported in full every run and
//!   swapped in atomically, so readers never see a half-written file
//! - **Watermark**: the append-only event stream is exported incrementally,
//!   only rows with an id above the last exported one
//! - **Revision**: an opaque marker of the store's state; an unchanged
//!   revision short-circuits the run
//! - **Shadow tables**: legacy tables whose rows are merged into each
//!   entity by ordering key when present
//!
//! ## Example
//!
//! ```ignore
//! use beads_backup::{BackupConfig, BackupExporter, Cancellation};
//!
//! let exporter = BackupExporter::new(store, BackupConfig::default());
//! let outcome = exporter.run(&Cancellation::new(), false)?;
//! println!("events exported up to id {}", outcome.state().last_watermark);
//! ```

pub mod backup;
pub mod config;
pub mod entities;
pub mod error;
pub mod export;
pub mod fs;
pub mod normalize;
pub mod source;
pub mod state;
pub mod types;

// Re-exports
pub use backup::{run_backup_export, truncate_hash, BackupExporter, RunOutcome};
pub use config::{AppendMode, BackupConfig};
pub use entities::{Entity, EntitySpec, EVENTS, SNAPSHOT_ENTITIES};
pub use error::{BackupError, Result, WriteStage};
pub use export::{export_incremental, export_table, merge_by_key, RowSource};
pub use fs::{write_atomic, StagedWrite};
pub use normalize::normalize;
pub use source::{MemoryStore, RevisionedStore};
pub use state::{BackupState, Counts, STATE_FILE};
pub use types::{Cancellation, RowSet, SqlValue, Statement};
