//! MERGE (upsert) statement generation.

use pgmerge_sql::{
    ColumnName, Expr, MergeInsert, MergeStmt, MergeUpdate, TableName, TableRef, render,
};

use crate::model::{
    ColumnClassification, ColumnRole, GeneratedStatement, KeyConstraint, StatementKind,
};
use crate::{Error, Result};

/// Alias of the destination inside the generated MERGE.
pub const TARGET_ALIAS: &str = "T";

/// Alias of the source inside the generated MERGE.
pub const SOURCE_ALIAS: &str = "S";

/// Build the MERGE AST for `source` into `key.table`.
///
/// - `ON`: `S.k = T.k` for every key column, joined with `AND`.
/// - `WHEN MATCHED`: payload columns set from the source. Omitted when the
///   key covers every shared column. Identity `ALWAYS` columns are never
///   updated.
/// - `WHEN NOT MATCHED`: every insertable shared column inserted from the
///   source, with `OVERRIDING SYSTEM VALUE` when one of them is an identity
///   `ALWAYS` column. Generated columns are left to the database.
///
/// Fails with [`Error::PartialKey`] if a key column is not among the shared
/// columns.
pub fn merge_stmt(
    source: &TableRef,
    key: &KeyConstraint,
    columns: &ColumnClassification,
) -> Result<MergeStmt> {
    ensure_key_shared(key, columns)?;

    let source_col = |name: &ColumnName| {
        Expr::qualified_column(TableName::from(SOURCE_ALIAS), name.clone())
    };
    let target_col = |name: &ColumnName| {
        Expr::qualified_column(TableName::from(TARGET_ALIAS), name.clone())
    };

    let on = Expr::all(columns.keys().map(|k| source_col(k).eq(target_col(k)))).ok_or_else(
        || Error::ConstraintNotFound {
            constraint: key.name.clone(),
            table: key.table.clone(),
        },
    )?;

    let mut stmt = MergeStmt::new(
        key.table.clone(),
        TARGET_ALIAS.into(),
        source.clone(),
        SOURCE_ALIAS.into(),
        on,
    );

    let update = columns
        .payload()
        .fold(MergeUpdate::default(), |update, col| {
            update.set(col.clone(), source_col(col))
        });
    if !update.assignments.is_empty() {
        stmt = stmt.when_matched(update);
    }

    let insert = columns
        .insertable()
        .fold(MergeInsert::default(), |insert, col| {
            insert.column(col.clone(), source_col(col))
        })
        .overriding_system_value(columns.overrides_identity());
    if !insert.columns.is_empty() {
        stmt = stmt.when_not_matched(insert);
    }

    Ok(stmt)
}

/// Render the upsert of `source` into `key.table`.
pub fn build_merge(
    source: &TableRef,
    key: &KeyConstraint,
    columns: &ColumnClassification,
) -> Result<GeneratedStatement> {
    Ok(GeneratedStatement {
        kind: StatementKind::Merge,
        sql: render(&merge_stmt(source, key, columns)?),
    })
}

fn ensure_key_shared(key: &KeyConstraint, columns: &ColumnClassification) -> Result<()> {
    let missing: Vec<ColumnName> = key
        .columns
        .iter()
        .filter(|col| columns.role(col) != Some(ColumnRole::Key))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialKey {
            constraint: key.name.clone(),
            table: key.table.clone(),
            missing,
        })
    }
}
