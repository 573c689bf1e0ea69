//! Catalog introspection.
//!
//! The builders never talk to the database; everything they need comes
//! through [`Catalog`], so they can be tested against synthetic schemas.
//! [`PgCatalog`] is the real implementation over `pg_catalog`.

use std::future::Future;

use pgmerge_sql::{ColumnName, SchemaName, TableRef};
use tokio_postgres::Row;

use crate::model::CatalogColumn;
use crate::traced::{Connection, TracedConn};
use crate::Result;

/// Read access to the system catalog.
///
/// Every call goes to the catalog; implementations must not cache across
/// invocations.
pub trait Catalog {
    /// Whether the relation exists.
    fn table_exists(&self, table: &TableRef) -> impl Future<Output = Result<bool>> + Send;

    /// Columns of a relation, in ordinal order.
    fn columns(&self, table: &TableRef)
    -> impl Future<Output = Result<Vec<CatalogColumn>>> + Send;

    /// Columns of the named unique or primary-key constraint, in constraint
    /// order. Empty if no such constraint exists on `table`.
    fn key_columns(
        &self,
        table: &TableRef,
        constraint: &str,
    ) -> impl Future<Output = Result<Vec<ColumnName>>> + Send;

    /// Name of the table's primary-key constraint, if it has one.
    fn primary_key_name(
        &self,
        table: &TableRef,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// The session's current schema, if the search path resolves to one.
    fn current_schema(&self) -> impl Future<Output = Result<Option<SchemaName>>> + Send;
}

const TABLE_EXISTS_SQL: &str = "\
SELECT EXISTS (
    SELECT 1
    FROM pg_catalog.pg_class c
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
      AND c.relname = $2
      AND c.relkind IN ('r', 'p', 'v', 'm', 'f')
)";

const COLUMNS_SQL: &str = "\
SELECT a.attname::text,
       pg_catalog.format_type(a.atttypid, a.atttypmod),
       a.attgenerated <> '',
       a.attidentity = 'a'
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
  AND c.relname = $2
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY a.attnum";

const KEY_COLUMNS_SQL: &str = "\
SELECT a.attname::text
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
WHERE n.nspname = $1
  AND c.relname = $2
  AND con.conname = $3
  AND con.contype IN ('p', 'u')
ORDER BY k.ord";

const PRIMARY_KEY_NAME_SQL: &str = "\
SELECT con.conname::text
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
  AND c.relname = $2
  AND con.contype = 'p'";

const CURRENT_SCHEMA_SQL: &str = "SELECT current_schema()::text";

/// [`Catalog`] backed by `pg_catalog`, read through a traced connection.
pub struct PgCatalog<'a, C: Connection> {
    conn: TracedConn<'a, C>,
}

impl<'a, C: Connection> PgCatalog<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self {
            conn: TracedConn::new(conn),
        }
    }
}

impl<C: Connection> Catalog for PgCatalog<'_, C> {
    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let schema = table.schema.as_str();
        let name = table.name.as_str();
        let rows = self
            .conn
            .query(TABLE_EXISTS_SQL, &[&schema, &name])
            .await?;
        match rows.first() {
            Some(row) => Ok(row.try_get(0)?),
            None => Ok(false),
        }
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<CatalogColumn>> {
        let schema = table.schema.as_str();
        let name = table.name.as_str();
        let rows = self.conn.query(COLUMNS_SQL, &[&schema, &name]).await?;
        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    name: text(row, 0)?.into(),
                    data_type: text(row, 1)?,
                    generated: row.try_get(2)?,
                    identity_always: row.try_get(3)?,
                })
            })
            .collect()
    }

    async fn key_columns(&self, table: &TableRef, constraint: &str) -> Result<Vec<ColumnName>> {
        let schema = table.schema.as_str();
        let name = table.name.as_str();
        let rows = self
            .conn
            .query(KEY_COLUMNS_SQL, &[&schema, &name, &constraint])
            .await?;
        rows.iter().map(|row| Ok(text(row, 0)?.into())).collect()
    }

    async fn primary_key_name(&self, table: &TableRef) -> Result<Option<String>> {
        let schema = table.schema.as_str();
        let name = table.name.as_str();
        let rows = self
            .conn
            .query(PRIMARY_KEY_NAME_SQL, &[&schema, &name])
            .await?;
        rows.first().map(|row| text(row, 0)).transpose()
    }

    async fn current_schema(&self) -> Result<Option<SchemaName>> {
        let rows = self.conn.query(CURRENT_SCHEMA_SQL, &[]).await?;
        let schema: Option<String> = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => None,
        };
        Ok(schema.map(SchemaName::from))
    }
}

fn text(row: &Row, idx: usize) -> Result<String> {
    Ok(row.try_get(idx)?)
}
