//! Anti-join DELETE statement generation.

use pgmerge_sql::{DeleteStmt, Expr, Query, SelectStmt, TableRef, render};

use crate::model::{GeneratedStatement, KeyConstraint, StatementKind};
use crate::{Error, Result};

/// Build the DELETE AST removing rows of `key.table` whose key is absent
/// from `source`:
///
/// ```sql
/// DELETE FROM dest
/// WHERE (k1, k2) IN (SELECT k1, k2 FROM dest EXCEPT SELECT k1, k2 FROM source)
/// ```
///
/// Only key columns appear; rows whose key survives are never touched, even
/// if their payload differs.
pub fn delete_stmt(source: &TableRef, key: &KeyConstraint) -> Result<DeleteStmt> {
    if key.columns.is_empty() {
        return Err(Error::ConstraintNotFound {
            constraint: key.name.clone(),
            table: key.table.clone(),
        });
    }

    let project = |table: &TableRef| -> Query {
        SelectStmt::new(table.clone())
            .columns(key.columns.iter().cloned())
            .into()
    };
    let vanished = project(&key.table).except(project(source));
    let key_tuple = Expr::tuple(key.columns.iter().cloned().map(Expr::column));

    Ok(DeleteStmt::new(key.table.clone()).where_(key_tuple.in_query(vanished)))
}

/// Render the delete-missing statement for `source` and `key.table`.
pub fn build_delete(source: &TableRef, key: &KeyConstraint) -> Result<GeneratedStatement> {
    Ok(GeneratedStatement {
        kind: StatementKind::Delete,
        sql: render(&delete_stmt(source, key)?),
    })
}
