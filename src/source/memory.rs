//! In-memory store implementation.

use super::RevisionedStore;
use crate::error::{BackupError, Result};
use crate::types::{cmp_rows, Cancellation, RowSet, SqlValue, Statement};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Clone, Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, Table>,
    executed: Vec<Statement>,
    revision_reads: usize,
    failing_tables: HashSet<String>,
    failing_scans: HashMap<String, usize>,
    cancel_on: HashMap<String, Cancellation>,
    fail_revision: bool,
    fail_probe: bool,
}

/// An in-memory table store.
///
/// Understands exactly the statements the exporter issues:
///
/// ```text
/// SELECT <* | `col`, ...> FROM <table> [WHERE `col` > ?] ORDER BY `col`, ... [ASC]
/// ```
///
/// The revision marker is a SHA-256 over the table contents, so any
/// mutation changes it and an empty store reports `""`. Fault injection
/// hooks cover query failures, mid-scan failures, revision failures and
/// cancellation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a table with the given columns.
    pub fn create_table(&self, name: &str, columns: &[&str]) {
        self.inner.lock().tables.insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn drop_table(&self, name: &str) {
        self.inner.lock().tables.remove(name);
    }

    /// Append a row; its arity must match the table's columns.
    pub fn insert(&self, table: &str, row: Vec<SqlValue>) -> Result<()> {
        let mut inner = self.inner.lock();
        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| BackupError::Query(format!("table {table} doesn't exist")))?;
        if row.len() != t.columns.len() {
            return Err(BackupError::Query(format!(
                "table {table} has {} columns, got {}",
                t.columns.len(),
                row.len()
            )));
        }
        t.rows.push(row);
        Ok(())
    }

    /// Every query against `table` fails.
    pub fn fail_queries_on(&self, table: &str) {
        self.inner.lock().failing_tables.insert(table.to_string());
    }

    /// Scans of `table` fail after `rows` rows have been yielded.
    pub fn fail_scan_after(&self, table: &str, rows: usize) {
        self.inner.lock().failing_scans.insert(table.to_string(), rows);
    }

    /// Querying `table` trips `ctx`, as if the caller cancelled mid-run.
    pub fn cancel_on_query(&self, table: &str, ctx: &Cancellation) {
        self.inner
            .lock()
            .cancel_on
            .insert(table.to_string(), ctx.clone());
    }

    pub fn fail_revision(&self, fail: bool) {
        self.inner.lock().fail_revision = fail;
    }

    /// Make the table-existence probe itself fail.
    pub fn fail_probe(&self, fail: bool) {
        self.inner.lock().fail_probe = fail;
    }

    /// Clear all injected faults.
    pub fn heal(&self) {
        let mut inner = self.inner.lock();
        inner.failing_tables.clear();
        inner.failing_scans.clear();
        inner.cancel_on.clear();
        inner.fail_revision = false;
        inner.fail_probe = false;
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<Statement> {
        self.inner.lock().executed.clone()
    }

    pub fn revision_reads(&self) -> usize {
        self.inner.lock().revision_reads
    }

    pub fn clear_log(&self) {
        let mut inner = self.inner.lock();
        inner.executed.clear();
        inner.revision_reads = 0;
    }
}

impl RevisionedStore for MemoryStore {
    fn query(&self, ctx: &Cancellation, statement: &Statement) -> Result<RowSet> {
        ctx.check()?;
        let mut inner = self.inner.lock();
        inner.executed.push(statement.clone());

        let select = Select::parse(&statement.sql)?;
        if let Some(token) = inner.cancel_on.get(&select.table) {
            token.cancel();
        }
        if inner.failing_tables.contains(&select.table) {
            return Err(BackupError::Query(format!(
                "injected failure querying {}",
                select.table
            )));
        }
        let table = inner
            .tables
            .get(&select.table)
            .ok_or_else(|| BackupError::Query(format!("table {} doesn't exist", select.table)))?;

        let index_of = |name: &str| {
            table
                .columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| BackupError::Query(format!("unknown column {name}")))
        };

        let mut rows: Vec<&Vec<SqlValue>> = table.rows.iter().collect();

        if let Some(column) = &select.after {
            let i = index_of(column.as_str())?;
            let bound = statement
                .args
                .first()
                .ok_or_else(|| BackupError::Query("missing argument for ?".into()))?;
            rows.retain(|row| row[i].cmp_key(bound) == Ordering::Greater);
        }

        let order = select
            .order_by
            .iter()
            .map(|c| index_of(c.as_str()))
            .collect::<Result<Vec<_>>>()?;
        rows.sort_by(|a, b| cmp_rows(a, b, &order));

        let (columns, positions): (Vec<String>, Vec<usize>) = match &select.projection {
            None => (table.columns.clone(), (0..table.columns.len()).collect()),
            Some(cols) => {
                let positions = cols.iter().map(|c| index_of(c.as_str())).collect::<Result<Vec<_>>>()?;
                (cols.clone(), positions)
            }
        };
        let projected: Vec<Vec<SqlValue>> = rows
            .into_iter()
            .map(|row| positions.iter().map(|&i| row[i].clone()).collect())
            .collect();

        match inner.failing_scans.get(&select.table).copied() {
            None => Ok(RowSet::from_rows(columns, projected)),
            Some(limit) => {
                let table = select.table;
                let iter = projected
                    .into_iter()
                    .map(Ok)
                    .take(limit)
                    .chain(std::iter::once(Err(BackupError::Scan(format!(
                        "injected scan failure in {table}"
                    )))));
                Ok(RowSet::new(columns, Box::new(iter)))
            }
        }
    }

    fn current_revision(&self, ctx: &Cancellation) -> Result<String> {
        ctx.check()?;
        let mut inner = self.inner.lock();
        inner.revision_reads += 1;
        if inner.fail_revision {
            return Err(BackupError::Query("injected revision failure".into()));
        }
        if inner.tables.values().all(|t| t.rows.is_empty()) {
            return Ok(String::new());
        }

        let mut hasher = Sha256::new();
        for (name, table) in &inner.tables {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            for column in &table.columns {
                hasher.update(column.as_bytes());
                hasher.update([0]);
            }
            for row in &table.rows {
                for value in row {
                    hasher.update(format!("{value:?}").as_bytes());
                    hasher.update([0]);
                }
                hasher.update([1]);
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn table_exists(&self, ctx: &Cancellation, table: &str) -> Result<bool> {
        ctx.check()?;
        let inner = self.inner.lock();
        if inner.fail_probe {
            return Err(BackupError::Query("injected probe failure".into()));
        }
        Ok(inner.tables.contains_key(table))
    }
}

/// The subset of SELECT the exporter generates.
#[derive(Debug, PartialEq)]
struct Select {
    projection: Option<Vec<String>>,
    table: String,
    after: Option<String>,
    order_by: Vec<String>,
}

impl Select {
    fn parse(sql: &str) -> Result<Self> {
        let unsupported = || BackupError::Query(format!("unsupported statement: {sql}"));

        let rest = sql.trim().strip_prefix("SELECT ").ok_or_else(unsupported)?;
        let (projection, rest) = rest.split_once(" FROM ").ok_or_else(unsupported)?;
        let (head, order) = match rest.split_once(" ORDER BY ") {
            Some((head, order)) => (head, Some(order)),
            None => (rest, None),
        };
        let (table, after) = match head.split_once(" WHERE ") {
            Some((table, cond)) => {
                let (column, placeholder) = cond.split_once(" > ").ok_or_else(unsupported)?;
                if placeholder.trim() != "?" {
                    return Err(unsupported());
                }
                (table, Some(unquote(column)))
            }
            None => (head, None),
        };

        let projection = match projection.trim() {
            "*" => None,
            cols => Some(cols.split(',').map(unquote).collect()),
        };
        let order_by = order
            .map(|o| {
                o.split(',')
                    .map(|c| {
                        let c = c.trim();
                        unquote(c.strip_suffix(" ASC").unwrap_or(c))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            projection,
            table: unquote(table),
            after,
            order_by,
        })
    }
}

fn unquote(ident: &str) -> String {
    ident.trim().trim_matches('`').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_events() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("events", &["id", "event_type"]);
        for (id, kind) in [(3, "closed"), (1, "created"), (2, "updated")] {
            store
                .insert("events", vec![SqlValue::Int(id), SqlValue::text(kind)])
                .unwrap();
        }
        store
    }

    fn ids(rows: RowSet) -> Vec<i64> {
        rows.map(|r| r.unwrap()[0].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_parse_select() {
        let select = Select::parse("SELECT `id`, `key` FROM `config` WHERE `id` > ? ORDER BY `key` ASC").unwrap();
        assert_eq!(
            select,
            Select {
                projection: Some(vec!["id".into(), "key".into()]),
                table: "config".into(),
                after: Some("id".into()),
                order_by: vec!["key".into()],
            }
        );
        assert!(Select::parse("DELETE FROM issues").is_err());
    }

    #[test]
    fn test_query_orders_and_filters() {
        let store = store_with_events();
        let ctx = Cancellation::new();

        let all = store
            .query(&ctx, &Statement::new("SELECT * FROM `events` ORDER BY `id`"))
            .unwrap();
        assert_eq!(all.columns(), ["id", "event_type"]);
        assert_eq!(ids(all), vec![1, 2, 3]);

        let newer = store
            .query(
                &ctx,
                &Statement::new("SELECT `id` FROM `events` WHERE `id` > ? ORDER BY `id` ASC").bind(1i64),
            )
            .unwrap();
        assert_eq!(newer.columns(), ["id"]);
        assert_eq!(ids(newer), vec![2, 3]);
    }

    #[test]
    fn test_revision_tracks_content() {
        let store = MemoryStore::new();
        let ctx = Cancellation::new();
        store.create_table("issues", &["id"]);
        assert_eq!(store.current_revision(&ctx).unwrap(), "");

        store.insert("issues", vec![SqlValue::text("bd-1")]).unwrap();
        let first = store.current_revision(&ctx).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(store.current_revision(&ctx).unwrap(), first);

        store.insert("issues", vec![SqlValue::text("bd-2")]).unwrap();
        assert_ne!(store.current_revision(&ctx).unwrap(), first);
        assert_eq!(store.revision_reads(), 4);
    }

    #[test]
    fn test_insert_checks_arity() {
        let store = store_with_events();
        assert!(store.insert("events", vec![SqlValue::Int(9)]).is_err());
        assert!(store.insert("missing", vec![]).is_err());
    }

    #[test]
    fn test_injected_scan_failure() {
        let store = store_with_events();
        store.fail_scan_after("events", 1);

        let rows: Vec<_> = store
            .query(&Cancellation::new(), &Statement::new("SELECT * FROM `events` ORDER BY `id`"))
            .unwrap()
            .collect();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(BackupError::Scan(_))));
    }

    #[test]
    fn test_cancelled_context_rejects_queries() {
        let store = store_with_events();
        let ctx = Cancellation::new();
        ctx.cancel();

        assert!(matches!(
            store.current_revision(&ctx),
            Err(BackupError::Cancelled)
        ));
        assert!(store.executed().is_empty());
    }
}
