//! Crash-safe whole-file replacement.

use crate::error::{BackupError, Result, WriteStage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

/// Prefix of in-flight temp files. They live next to the target so the
/// final rename never crosses a filesystem.
pub const TEMP_PREFIX: &str = ".backup-tmp-";

/// A fully written and synced temp file waiting to be renamed onto its target.
///
/// Dropping it without calling [`StagedWrite::commit`] removes the temp file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: NamedTempFile,
}

impl StagedWrite {
    /// Path of the temp file holding the staged payload.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file onto the target.
    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp.persist(&target).map_err(|e| BackupError::AtomicWrite {
            path: target.clone(),
            stage: WriteStage::Persist,
            source: e.error,
        })?;
        sync_parent_dir(&target)?;
        Ok(())
    }
}

/// Write `data` to a temp file beside `path` and force it to disk.
pub fn stage(path: impl AsRef<Path>, data: &[u8]) -> Result<StagedWrite> {
    let target = path.as_ref().to_path_buf();
    let dir = parent_dir(&target);
    let fail = |stage| {
        let path = target.clone();
        move |source| BackupError::AtomicWrite {
            path,
            stage,
            source,
        }
    };

    fs::create_dir_all(dir).map_err(fail(WriteStage::CreateDir))?;

    let mut temp = Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(fail(WriteStage::CreateTemp))?;

    // On any error below `temp` is dropped, which unlinks it.
    temp.write_all(data).map_err(fail(WriteStage::Write))?;
    temp.flush().map_err(fail(WriteStage::Write))?;
    temp.as_file().sync_all().map_err(fail(WriteStage::Sync))?;

    Ok(StagedWrite { target, temp })
}

/// Replace the content of `path` with `data` atomically.
///
/// After a successful return the file holds exactly `data`. A crash at any
/// point leaves either the previous content or the new content.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    stage(path, data)?.commit()
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn sync_parent_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = fs::File::open(parent_dir(path))?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
