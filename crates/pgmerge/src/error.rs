use pgmerge_sql::{ColumnName, TableRef};
use thiserror::Error;

use crate::StatementKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("table {table} does not exist")]
    TableNotFound { table: TableRef },

    #[error("source and destination are the same table: {table}")]
    SameTable { table: TableRef },

    #[error(
        "key {constraint} on {table} is not fully present in the source (missing: {})",
        join_columns(missing)
    )]
    PartialKey {
        constraint: String,
        table: TableRef,
        missing: Vec<ColumnName>,
    },

    #[error("no unique or primary key constraint named {constraint} on {table}")]
    ConstraintNotFound { constraint: String, table: TableRef },

    #[error("table {table} has no primary key")]
    NoKey { table: TableRef },

    #[error("current schema is not set (empty search_path?)")]
    NoCurrentSchema,

    #[error("catalog query failed: {0}")]
    Catalog(#[from] tokio_postgres::Error),

    #[error("{kind} statement failed: {source}")]
    Execution {
        kind: StatementKind,
        #[source]
        source: tokio_postgres::Error,
    },
}

fn join_columns(columns: &[ColumnName]) -> String {
    columns
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
