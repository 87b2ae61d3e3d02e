//! Core types shared by the exporters and the store collaborator.

use crate::error::{BackupError, Result};
use chrono::{DateTime, FixedOffset};
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// A driver-level value as scanned from a result row.
///
/// The column set of a query is not known ahead of time, so rows are
/// vectors of these tagged scalars rather than fixed records.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Temporal column. `None` is a zero/unset value (e.g. `0000-00-00`).
    Timestamp(Option<DateTime<FixedOffset>>),
    /// Native JSON column, passed through as-is.
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn text(s: impl Into<String>) -> Self {
        SqlValue::Text(s.into())
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            SqlValue::Int(v) => *v as f64,
            SqlValue::UInt(v) => *v as f64,
            SqlValue::Float(v) => *v,
            _ => f64::NAN,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SqlValue::Null => 0,
            SqlValue::Bool(_) => 1,
            SqlValue::Int(_) | SqlValue::UInt(_) | SqlValue::Float(_) => 2,
            SqlValue::Text(_) | SqlValue::Bytes(_) => 3,
            SqlValue::Timestamp(_) => 4,
            SqlValue::Json(_) => 5,
        }
    }

    /// Total ordering used for ordering keys.
    ///
    /// Null < bool < numbers < text/bytes < timestamps < JSON. Numbers
    /// compare numerically across integer and float tags; text and bytes
    /// compare bytewise.
    pub fn cmp_key(&self, other: &SqlValue) -> Ordering {
        use SqlValue::*;

        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (UInt(a), UInt(b)) => a.cmp(b),
            (Int(a), UInt(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (UInt(a), Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
            (Text(_) | Bytes(_), Text(_) | Bytes(_)) => self.key_bytes().cmp(other.key_bytes()),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (Json(a), Json(b)) => a.to_string().cmp(&b.to_string()),
            _ if self.rank() == 2 && other.rank() == 2 => self.as_f64().total_cmp(&other.as_f64()),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn key_bytes(&self) -> &[u8] {
        match self {
            SqlValue::Text(s) => s.as_bytes(),
            SqlValue::Bytes(b) => b,
            _ => &[],
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

/// Compare two rows by the values at `key` positions.
pub fn cmp_rows(a: &[SqlValue], b: &[SqlValue], key: &[usize]) -> Ordering {
    for &i in key {
        let ord = match (a.get(i), b.get(i)) {
            (Some(x), Some(y)) => x.cmp_key(y),
            (x, y) => x.is_some().cmp(&y.is_some()),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A query statement with positional `?` arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    /// Bind the next positional argument.
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.args.push(value.into());
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Row iterator yielding one scanned row at a time.
pub type RowIter = Box<dyn Iterator<Item = Result<Vec<SqlValue>>>>;

/// The result of a query: discovered column names plus a fallible row stream.
pub struct RowSet {
    columns: Vec<String>,
    rows: RowIter,
}

impl RowSet {
    pub fn new(columns: Vec<String>, rows: RowIter) -> Self {
        Self { columns, rows }
    }

    /// Build a row set from already materialized rows.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self::new(columns, Box::new(rows.into_iter().map(Ok)))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column, by name.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| BackupError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, RowIter) {
        (self.columns, self.rows)
    }
}

impl Iterator for RowSet {
    type Item = Result<Vec<SqlValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSet")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Cooperative cancellation signal threaded through every store call.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }

    /// Return `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(BackupError::Cancelled)
        } else {
            Ok(())
        }
    }
}
