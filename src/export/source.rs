//! Where an export's rows come from.

use super::merge::merge_by_key;
use crate::entities::EntitySpec;
use crate::error::Result;
use crate::source::RevisionedStore;
use crate::types::{Cancellation, RowSet, Statement};

/// A primary statement, optionally merged with a shadow statement.
#[derive(Clone, Debug)]
pub struct RowSource {
    pub primary: Statement,
    pub shadow: Option<Statement>,
    /// Merge key; only consulted when `shadow` is set.
    pub key: &'static [&'static str],
}

impl RowSource {
    /// A single statement, no merge.
    pub fn single(statement: Statement) -> Self {
        Self {
            primary: statement,
            shadow: None,
            key: &[],
        }
    }

    /// Every row of an entity, including shadow rows when `with_shadow`.
    pub fn snapshot(spec: &EntitySpec, with_shadow: bool) -> Self {
        Self {
            primary: spec.primary(),
            shadow: if with_shadow { spec.shadow() } else { None },
            key: spec.key,
        }
    }

    /// Rows of an entity past `watermark`, including shadow rows when `with_shadow`.
    pub fn after(spec: &EntitySpec, watermark: i64, with_shadow: bool) -> Self {
        Self {
            primary: spec.primary_after(watermark),
            shadow: if with_shadow {
                spec.shadow_after(watermark)
            } else {
                None
            },
            key: spec.key,
        }
    }

    /// Run the statement(s) and return one ordered row stream.
    pub fn open<S: RevisionedStore + ?Sized>(&self, store: &S, ctx: &Cancellation) -> Result<RowSet> {
        let primary = store.query(ctx, &self.primary)?;
        match &self.shadow {
            None => Ok(primary),
            Some(shadow) => {
                let shadow = store.query(ctx, shadow)?;
                merge_by_key(primary, shadow, self.key)
            }
        }
    }
}
