//! Set-based table reconciliation for Postgres.
//!
//! Given a source and a destination table with overlapping columns and a
//! unique key on the destination, this crate generates and runs:
//!
//! - an **upsert**: one `MERGE` that inserts missing rows and updates the
//!   non-key columns of matching rows (source wins);
//! - a **reconcile-deletes**: one `DELETE` removing destination rows whose
//!   key no longer exists in the source.
//!
//! Both are computed from the catalog on every call. Nothing is cached.
//!
//! # Naming Convention
//!
//! Names are taken verbatim as stored in the catalog, so `User` and `user`
//! are different tables. Every identifier is double-quoted when rendered.
//!
//! # Usage
//!
//! ```ignore
//! let tx = client.transaction().await?;
//! let reconciler = pgmerge::postgres(&tx);
//!
//! let request = MergeRequest::new("user_import", "user");
//! let upserted = reconciler.upsert(&request).await?;
//! let deleted = reconciler.reconcile_deletes(&request).await?;
//! tx.commit().await?;
//! ```
//!
//! The caller owns the transaction; statements run on whatever connection
//! or transaction is handed in.

mod catalog;
mod check;
mod delete;
mod error;
mod execute;
mod merge;
mod model;
mod reconcile;
mod traced;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, PgCatalog};
pub use check::{Checked, check};
pub use delete::{build_delete, delete_stmt};
pub use error::Error;
pub use execute::Executor;
pub use merge::{SOURCE_ALIAS, TARGET_ALIAS, build_merge, merge_stmt};
pub use model::{
    CatalogColumn, ColumnClassification, ColumnRole, GeneratedStatement, KeyConstraint,
    StatementKind,
};
pub use reconcile::{MergeRequest, Outcome, Reconciler, ResolvedRequest, TableSpec, postgres};
pub use traced::{Connection, ConnectionExt, TracedConn};

// Re-export the name types callers need to build requests
pub use pgmerge_sql::{ColumnName, SchemaName, TableName, TableRef};

/// Result type for pgmerge operations.
pub type Result<T> = std::result::Result<T, Error>;
