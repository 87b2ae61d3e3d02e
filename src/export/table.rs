//! Full-snapshot export of one query to a JSONL file.

use super::source::RowSource;
use crate::error::{BackupError, Result};
use crate::fs::write_atomic;
use crate::normalize::normalize_row;
use crate::source::RevisionedStore;
use crate::types::{Cancellation, RowSet, SqlValue};
use std::path::Path;
use tracing::debug;

/// Rows serialized as newline-delimited JSON.
#[derive(Debug, Default)]
pub struct Jsonl {
    pub bytes: Vec<u8>,
    pub rows: u64,
}

/// Serialize every row as one compact JSON object per line.
///
/// Columns come from the result set. `inspect` sees each raw row before it
/// is normalized. Nothing is written anywhere: on error the partial buffer
/// is dropped.
pub fn encode_jsonl(
    ctx: &Cancellation,
    rows: RowSet,
    mut inspect: impl FnMut(&[SqlValue]),
) -> Result<Jsonl> {
    let (columns, rows) = rows.into_parts();
    let mut out = Jsonl::default();

    for row in rows {
        ctx.check()?;
        let values = row?;
        if values.len() != columns.len() {
            return Err(BackupError::Scan(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        inspect(&values);

        let object = normalize_row(&columns, &values);
        serde_json::to_writer(&mut out.bytes, &object)?;
        out.bytes.push(b'\n');
        out.rows += 1;
    }

    Ok(out)
}

/// Export all rows of `source` to `path`, replacing it atomically.
///
/// The whole file is built in memory first, so a failed or cancelled export
/// leaves the previous file untouched. Zero rows still produce an (empty)
/// file. Returns the row count.
pub fn export_table<S: RevisionedStore + ?Sized>(
    store: &S,
    ctx: &Cancellation,
    source: &RowSource,
    path: &Path,
) -> Result<u64> {
    let rows = source.open(store, ctx)?;
    let encoded = encode_jsonl(ctx, rows, |_| {})?;
    write_atomic(path, &encoded.bytes)?;

    debug!(path = %path.display(), rows = encoded.rows, "exported table");
    Ok(encoded.rows)
}
