//! Traced access to a tokio-postgres client or transaction.
//!
//! Catalog reads and generated statements both go through [`TracedConn`],
//! which opens a `db` span per call. The span carries the operation, the
//! SQL text and, once the call returns, the row count. Statements also
//! carry their kind, so `RUST_LOG=pgmerge=debug` shows which MERGE or
//! DELETE touched how many rows.

use std::future::Future;
use std::pin::Pin;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::field::{Empty, display};
use tracing::{Instrument, Span};

use crate::model::GeneratedStatement;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;
type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// A client or transaction that catalog reads and statements run on.
///
/// Implemented for `tokio_postgres::Client` and `tokio_postgres::Transaction`,
/// so statements join whatever transaction the caller holds.
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, u64>;

    /// Execute a query, returning all rows.
    fn query<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Vec<Row>>;
}

macro_rules! impl_connection {
    ($ty:ty) => {
        impl Connection for $ty {
            fn execute<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, u64> {
                Box::pin(<$ty>::execute(self, sql, params))
            }

            fn query<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Vec<Row>> {
                Box::pin(<$ty>::query(self, sql, params))
            }
        }
    };
}

impl_connection!(tokio_postgres::Client);
impl_connection!(tokio_postgres::Transaction<'_>);

/// Borrowed connection whose calls are wrapped in `db` spans.
pub struct TracedConn<'a, C: Connection> {
    conn: &'a C,
}

impl<'a, C: Connection> TracedConn<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Run a generated statement, returning the number of rows it affected.
    pub async fn execute(&self, statement: &GeneratedStatement) -> Result<u64, Error> {
        let span = db_span("execute", &statement.sql, 0);
        span.record("kind", display(statement.kind));
        let rows = self
            .conn
            .execute(&statement.sql, &[])
            .instrument(span.clone())
            .await?;
        span.record("rows", rows);
        Ok(rows)
    }

    /// Run a catalog query, returning all rows.
    pub async fn query(&self, sql: &str, params: Params<'_>) -> Result<Vec<Row>, Error> {
        let span = db_span("query", sql, params.len());
        let rows = self
            .conn
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }
}

/// `kind` and `rows` start empty and are recorded by the caller.
fn db_span(op: &'static str, sql: &str, params: usize) -> Span {
    tracing::debug_span!(
        "db",
        op = %op,
        sql = %sql,
        params,
        kind = Empty,
        rows = Empty,
    )
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection + Sized {
    fn traced(&self) -> TracedConn<'_, Self> {
        TracedConn::new(self)
    }
}

impl<C: Connection> ConnectionExt for C {}
