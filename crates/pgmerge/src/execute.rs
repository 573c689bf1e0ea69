//! Statement execution.

use std::future::Future;

use crate::model::GeneratedStatement;
use crate::traced::{Connection, TracedConn};
use crate::{Error, Result};

/// Runs a generated statement.
///
/// Implementations run the statement on the caller's connection or
/// transaction. They do not open, commit or roll back transactions, and
/// they do not retry.
pub trait Executor {
    /// Run `statement`, returning the number of rows it affected.
    fn execute_statement(
        &self,
        statement: &GeneratedStatement,
    ) -> impl Future<Output = Result<u64>> + Send;
}

impl<C: Connection> Executor for TracedConn<'_, C> {
    async fn execute_statement(&self, statement: &GeneratedStatement) -> Result<u64> {
        self.execute(statement)
            .await
            .map_err(|source| Error::Execution {
                kind: statement.kind,
                source,
            })
    }
}
