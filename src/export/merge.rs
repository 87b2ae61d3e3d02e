//! Stable merge of two key-ordered row streams.

use crate::error::{BackupError, Result};
use crate::types::{cmp_rows, RowIter, RowSet, SqlValue};
use std::cmp::Ordering;
use std::iter::Peekable;

/// Interleave `shadow` rows into `primary` rows by `key`.
///
/// Both inputs must already be ascending by `key`. Rows with equal keys are
/// all kept, primary first. Shadow rows are aligned with primary columns by
/// position, as in `UNION ALL`, so both sides must have the same arity.
pub fn merge_by_key(primary: RowSet, shadow: RowSet, key: &[&str]) -> Result<RowSet> {
    if primary.columns().len() != shadow.columns().len() {
        return Err(BackupError::ColumnMismatch {
            primary: primary.columns().len(),
            shadow: shadow.columns().len(),
        });
    }
    let key = key
        .iter()
        .map(|column| primary.column_index(column))
        .collect::<Result<Vec<_>>>()?;

    let (columns, primary) = primary.into_parts();
    let (_, shadow) = shadow.into_parts();

    let merged = MergeByKey {
        primary: primary.peekable(),
        shadow: shadow.peekable(),
        key,
        done: false,
    };
    Ok(RowSet::new(columns, Box::new(merged)))
}

enum Take {
    Primary,
    Shadow,
}

struct MergeByKey {
    primary: Peekable<RowIter>,
    shadow: Peekable<RowIter>,
    key: Vec<usize>,
    done: bool,
}

impl Iterator for MergeByKey {
    type Item = Result<Vec<SqlValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // Errors are surfaced as soon as either side reaches one.
        let take = match (self.primary.peek(), self.shadow.peek()) {
            (None, None) => return None,
            (Some(Err(_)), _) | (Some(Ok(_)), None) => Take::Primary,
            (_, Some(Err(_))) | (None, Some(Ok(_))) => Take::Shadow,
            (Some(Ok(p)), Some(Ok(s))) => match cmp_rows(p, s, &self.key) {
                Ordering::Greater => Take::Shadow,
                Ordering::Less | Ordering::Equal => Take::Primary,
            },
        };

        let next = match take {
            Take::Primary => self.primary.next(),
            Take::Shadow => self.shadow.next(),
        };
        if matches!(next, Some(Err(_))) {
            self.done = true;
        }
        next
    }
}
