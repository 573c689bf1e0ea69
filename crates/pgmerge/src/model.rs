//! Per-invocation values derived from the catalog.
//!
//! Nothing here outlives a single `upsert` / `reconcile_deletes` call.

use std::fmt;

use indexmap::IndexMap;
use pgmerge_sql::{ColumnName, TableRef};

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: ColumnName,
    /// `format_type()` output, e.g. `integer` or `character varying(20)`.
    pub data_type: String,
    /// `GENERATED ALWAYS AS (...)`: computed by the database, never written.
    pub generated: bool,
    /// `GENERATED ALWAYS AS IDENTITY`: writable only with
    /// `OVERRIDING SYSTEM VALUE`, and never by an UPDATE.
    pub identity_always: bool,
}

impl CatalogColumn {
    pub fn new(name: impl Into<ColumnName>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            generated: false,
            identity_always: false,
        }
    }

    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn identity_always(mut self) -> Self {
        self.identity_always = true;
        self
    }
}

/// A unique or primary-key constraint on the destination table.
///
/// `columns` is in constraint order and never empty once returned by the
/// checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConstraint {
    pub table: TableRef,
    pub name: String,
    pub columns: Vec<ColumnName>,
}

impl KeyConstraint {
    pub fn contains(&self, column: &ColumnName) -> bool {
        self.columns.contains(column)
    }
}

/// How a shared column takes part in a MERGE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Member of the key: matched on, never updated.
    Key,
    /// Updated on match.
    Payload,
    /// Inserted but never updated (`GENERATED ALWAYS AS IDENTITY`).
    InsertOnly,
}

#[derive(Debug, Clone, Copy)]
struct SharedColumn {
    role: ColumnRole,
    insertable: bool,
    identity_always: bool,
}

/// Shared columns of a source/destination pair, tagged by [`ColumnRole`].
///
/// Columns keep the destination's ordinal order. Generated destination
/// columns are left out unless they belong to the key, in which case they
/// are matched on but never inserted.
#[derive(Debug, Clone, Default)]
pub struct ColumnClassification {
    columns: IndexMap<ColumnName, SharedColumn>,
}

impl ColumnClassification {
    /// Intersect `destination` with `source` by name and tag each shared
    /// column against `key`.
    ///
    /// Types are not compared for compatibility; differing types are only
    /// logged, the database has the final word when the statement runs.
    pub fn classify(
        source: &[CatalogColumn],
        destination: &[CatalogColumn],
        key: &KeyConstraint,
    ) -> Self {
        let mut columns = IndexMap::new();

        for dest_col in destination {
            let Some(src_col) = source.iter().find(|c| c.name == dest_col.name) else {
                continue;
            };

            let in_key = key.contains(&dest_col.name);
            if dest_col.generated && !in_key {
                tracing::debug!(
                    column = dest_col.name.as_str(),
                    "skipping generated destination column"
                );
                continue;
            }

            if src_col.data_type != dest_col.data_type {
                tracing::warn!(
                    column = dest_col.name.as_str(),
                    source_type = %src_col.data_type,
                    destination_type = %dest_col.data_type,
                    "shared column has different types in source and destination"
                );
            }

            let role = if in_key {
                ColumnRole::Key
            } else if dest_col.identity_always {
                ColumnRole::InsertOnly
            } else {
                ColumnRole::Payload
            };
            columns.insert(
                dest_col.name.clone(),
                SharedColumn {
                    role,
                    insertable: !dest_col.generated,
                    identity_always: dest_col.identity_always,
                },
            );
        }

        Self { columns }
    }

    /// All shared columns in destination order.
    pub fn shared(&self) -> impl Iterator<Item = &ColumnName> {
        self.columns.keys()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ColumnName> {
        self.with_role(ColumnRole::Key)
    }

    pub fn payload(&self) -> impl Iterator<Item = &ColumnName> {
        self.with_role(ColumnRole::Payload)
    }

    /// Shared columns the INSERT branch writes: everything but generated
    /// key columns.
    pub fn insertable(&self) -> impl Iterator<Item = &ColumnName> {
        self.columns
            .iter()
            .filter(|(_, c)| c.insertable)
            .map(|(name, _)| name)
    }

    /// Whether the INSERT writes a `GENERATED ALWAYS AS IDENTITY` column and
    /// so needs `OVERRIDING SYSTEM VALUE`.
    pub fn overrides_identity(&self) -> bool {
        self.columns
            .values()
            .any(|c| c.insertable && c.identity_always)
    }

    pub fn role(&self, column: &ColumnName) -> Option<ColumnRole> {
        self.columns.get(column).map(|c| c.role)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn with_role(&self, role: ColumnRole) -> impl Iterator<Item = &ColumnName> {
        self.columns
            .iter()
            .filter(move |(_, c)| c.role == role)
            .map(|(name, _)| name)
    }
}

/// Kind of generated statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Merge,
    Delete,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Merge => "MERGE",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a builder: handed to the executor once, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStatement {
    pub kind: StatementKind,
    pub sql: String,
}
