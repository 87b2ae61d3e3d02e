//! Watermark-driven export of an append-only stream.

use super::source::RowSource;
use super::table::encode_jsonl;
use crate::config::AppendMode;
use crate::entities::EntitySpec;
use crate::error::Result;
use crate::fs::write_atomic;
use crate::source::RevisionedStore;
use crate::state::BackupState;
use crate::types::Cancellation;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::debug;

/// Export rows of `spec` whose key is above `state.last_watermark`.
///
/// With watermark 0 the result is written as a fresh file through the
/// atomic writer. Otherwise the new lines go after the existing content,
/// either appended in place or via a full atomic rewrite, per `mode`.
///
/// On success `state.last_watermark` moves to the highest key seen. When
/// there are no new rows, neither the file nor the watermark changes.
/// Returns the number of new rows.
///
/// The updated watermark lives only in `state` until the caller persists
/// it. If the caller fails afterwards and never saves, the next run
/// re-exports and re-appends these same rows.
pub fn export_incremental<S: RevisionedStore + ?Sized>(
    store: &S,
    ctx: &Cancellation,
    spec: &EntitySpec,
    with_shadow: bool,
    dir: &Path,
    mode: AppendMode,
    state: &mut BackupState,
) -> Result<u64> {
    let watermark = state.last_watermark;
    let rows = RowSource::after(spec, watermark, with_shadow).open(store, ctx)?;
    let key = rows.column_index(spec.key[0])?;

    let mut max_key: Option<i64> = None;
    let encoded = encode_jsonl(ctx, rows, |values| {
        if let Some(k) = values[key].as_i64() {
            max_key = Some(max_key.map_or(k, |m| m.max(k)));
        }
    })?;

    if encoded.rows == 0 {
        debug!(entity = %spec.entity, watermark, "no new rows");
        return Ok(0);
    }

    let path = dir.join(spec.entity.file_name());
    if watermark == 0 {
        write_atomic(&path, &encoded.bytes)?;
    } else {
        match mode {
            AppendMode::Append => append(&path, &encoded.bytes)?,
            AppendMode::Rewrite => rewrite(&path, &encoded.bytes)?,
        }
    }

    if let Some(k) = max_key {
        state.advance_watermark(k);
    }
    debug!(
        entity = %spec.entity,
        rows = encoded.rows,
        watermark = state.last_watermark,
        "exported new rows"
    );
    Ok(encoded.rows)
}

fn append(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_data()?;
    Ok(())
}

fn rewrite(path: &Path, data: &[u8]) -> Result<()> {
    let mut content = match fs::read(path) {
        Ok(existing) => existing,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    content.extend_from_slice(data);
    write_atomic(path, &content)
}
