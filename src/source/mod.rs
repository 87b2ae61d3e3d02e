//! The versioned relational store the exporter reads from.
//!
//! The engine only needs three things from a store: run a statement and
//! stream back rows with discovered columns, report an opaque revision
//! marker for change detection, and say whether a table exists. Anything
//! implementing [`RevisionedStore`] can be backed up; [`MemoryStore`] is an
//! in-process implementation used for tests and benchmarks.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{Cancellation, RowSet, Statement};
use std::sync::Arc;

/// Query executor with a content-addressable revision marker.
pub trait RevisionedStore {
    /// Run a statement. Columns are discovered from the result, not declared.
    fn query(&self, ctx: &Cancellation, statement: &Statement) -> Result<RowSet>;

    /// Opaque marker of the store's current state (e.g. a commit hash).
    /// An empty string means the store holds no data yet.
    fn current_revision(&self, ctx: &Cancellation) -> Result<String>;

    /// Metadata probe for a table.
    fn table_exists(&self, ctx: &Cancellation, table: &str) -> Result<bool>;
}

impl<T: RevisionedStore + ?Sized> RevisionedStore for &T {
    fn query(&self, ctx: &Cancellation, statement: &Statement) -> Result<RowSet> {
        (**self).query(ctx, statement)
    }

    fn current_revision(&self, ctx: &Cancellation) -> Result<String> {
        (**self).current_revision(ctx)
    }

    fn table_exists(&self, ctx: &Cancellation, table: &str) -> Result<bool> {
        (**self).table_exists(ctx, table)
    }
}

impl<T: RevisionedStore + ?Sized> RevisionedStore for Arc<T> {
    fn query(&self, ctx: &Cancellation, statement: &Statement) -> Result<RowSet> {
        (**self).query(ctx, statement)
    }

    fn current_revision(&self, ctx: &Cancellation) -> Result<String> {
        (**self).current_revision(ctx)
    }

    fn table_exists(&self, ctx: &Cancellation, table: &str) -> Result<bool> {
        (**self).table_exists(ctx, table)
    }
}
