//! Backup configuration and backup directory resolution.

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How new rows reach an existing incremental stream file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppendMode {
    /// Append in place. Cheap, but a crash mid-append can leave a torn last
    /// line; prior content is never touched.
    #[default]
    Append,
    /// Rewrite the whole file (old content plus new rows) through the atomic
    /// writer. Crash-atomic, cost proportional to the stream's history.
    Rewrite,
}

/// Backup configuration.
#[derive(Clone, Debug)]
pub struct BackupConfig {
    /// Project data directory; backups go to `<data_dir>/backup`.
    pub data_dir: PathBuf,

    /// Git repository to keep backups in instead (`<git_repo>/backup`).
    /// Ignored unless it contains `.git`. A leading `~/` is expanded.
    pub git_repo: Option<PathBuf>,

    /// Table whose presence switches on shadow-table merging for every entity.
    pub shadow_probe_table: String,

    /// Write policy for the incremental stream after its first export.
    pub append_mode: AppendMode,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".beads"),
            git_repo: None,
            shadow_probe_table: "wisps".to_string(),
            append_mode: AppendMode::default(),
        }
    }
}

impl BackupConfig {
    /// Backups rooted at `dir` directly; convenient for tests and embedding.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Resolve the backup directory, creating it if needed.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        if let Some(repo) = &self.git_repo {
            let repo = expand_home(repo);
            if repo.join(".git").exists() {
                let dir = repo.join("backup");
                create_private_dir(&dir)?;
                return Ok(dir);
            }
            debug!(
                repo = %repo.display(),
                "git_repo is not a git repository, falling back to data dir"
            );
        }

        let dir = self.data_dir.join("backup");
        create_private_dir(&dir)?;
        Ok(dir)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}
