//! The exported entities and the statements that read them.

use crate::types::Statement;
use std::fmt;

/// An exported entity set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    Issues,
    Events,
    Comments,
    Dependencies,
    Labels,
    Config,
}

impl Entity {
    pub fn name(self) -> &'static str {
        match self {
            Entity::Issues => "issues",
            Entity::Events => "events",
            Entity::Comments => "comments",
            Entity::Dependencies => "dependencies",
            Entity::Labels => "labels",
            Entity::Config => "config",
        }
    }

    /// Output file name inside the backup directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Entity::Issues => "issues.jsonl",
            Entity::Events => "events.jsonl",
            Entity::Comments => "comments.jsonl",
            Entity::Dependencies => "dependencies.jsonl",
            Entity::Labels => "labels.jsonl",
            Entity::Config => "config.jsonl",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one entity is read from the store.
#[derive(Clone, Copy, Debug)]
pub struct EntitySpec {
    pub entity: Entity,
    pub table: &'static str,
    /// Legacy table holding more rows of the same entity, if any.
    pub shadow_table: Option<&'static str>,
    /// Projected columns; empty means every column (`*`).
    pub columns: &'static [&'static str],
    /// Ordering key, also the merge key for shadow rows.
    pub key: &'static [&'static str],
}

impl EntitySpec {
    /// Full-table statement against the primary table.
    pub fn primary(&self) -> Statement {
        Statement::new(select(self.columns, self.table, None, self.key))
    }

    /// Full-table statement against the shadow table.
    pub fn shadow(&self) -> Option<Statement> {
        self.shadow_table
            .map(|table| Statement::new(select(self.columns, table, None, self.key)))
    }

    /// Rows of the primary table whose first key column exceeds `watermark`.
    pub fn primary_after(&self, watermark: i64) -> Statement {
        Statement::new(select(self.columns, self.table, Some(self.key[0]), self.key)).bind(watermark)
    }

    /// Rows of the shadow table whose first key column exceeds `watermark`.
    pub fn shadow_after(&self, watermark: i64) -> Option<Statement> {
        self.shadow_table.map(|table| {
            Statement::new(select(self.columns, table, Some(self.key[0]), self.key)).bind(watermark)
        })
    }
}

fn quote(ident: &str) -> String {
    format!("`{ident}`")
}

fn list(idents: &[&str]) -> String {
    idents.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

fn select(columns: &[&str], table: &str, after: Option<&str>, key: &[&str]) -> String {
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        list(columns)
    };
    let filter = after
        .map(|column| format!(" WHERE {} > ?", quote(column)))
        .unwrap_or_default();
    format!(
        "SELECT {projection} FROM {}{filter} ORDER BY {} ASC",
        quote(table),
        key.iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(" ASC, ")
    )
}

/// Full-snapshot entities, in export order.
pub const SNAPSHOT_ENTITIES: [EntitySpec; 5] = [
    EntitySpec {
        entity: Entity::Issues,
        table: "issues",
        shadow_table: Some("wisps"),
        // The issues schema is wide and keeps growing.
        columns: &[],
        key: &["id"],
    },
    EntitySpec {
        entity: Entity::Comments,
        table: "comments",
        shadow_table: Some("wisp_comments"),
        columns: &["id", "issue_id", "author", "text", "created_at"],
        key: &["id"],
    },
    EntitySpec {
        entity: Entity::Dependencies,
        table: "dependencies",
        shadow_table: Some("wisp_dependencies"),
        columns: &["issue_id", "depends_on_id", "type", "created_at", "created_by"],
        key: &["issue_id", "depends_on_id"],
    },
    EntitySpec {
        entity: Entity::Labels,
        table: "labels",
        shadow_table: Some("wisp_labels"),
        columns: &["issue_id", "label"],
        key: &["issue_id", "label"],
    },
    EntitySpec {
        entity: Entity::Config,
        table: "config",
        shadow_table: None,
        columns: &["key", "value"],
        key: &["key"],
    },
];

/// The append-only stream, exported by watermark on `id`.
pub const EVENTS: EntitySpec = EntitySpec {
    entity: Entity::Events,
    table: "events",
    shadow_table: Some("wisp_events"),
    columns: &[
        "id",
        "issue_id",
        "event_type",
        "actor",
        "old_value",
        "new_value",
        "comment",
        "created_at",
    ],
    key: &["id"],
};
