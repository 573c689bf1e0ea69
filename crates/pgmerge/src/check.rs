//! Preconditions checked before any statement text is built.

use pgmerge_sql::{ColumnName, TableRef};

use crate::catalog::Catalog;
use crate::model::{CatalogColumn, KeyConstraint};
use crate::{Error, Result};

/// What a successful check learned from the catalog.
#[derive(Debug, Clone)]
pub struct Checked {
    /// The destination's key, with at least one column.
    pub key: KeyConstraint,
    /// Source columns, already read to validate the key.
    pub source_columns: Vec<CatalogColumn>,
}

/// Validate a source/destination/key triple.
///
/// Fails with [`Error::SameTable`] if both refs name the same relation,
/// [`Error::TableNotFound`] if either is missing, [`Error::ConstraintNotFound`]
/// if the destination has no such unique/primary constraint, and
/// [`Error::PartialKey`] unless every key column also exists in the source.
///
/// Read-only. Runs on every call; results are not cached.
pub async fn check<C: Catalog>(
    catalog: &C,
    source: &TableRef,
    destination: &TableRef,
    key_name: &str,
) -> Result<Checked> {
    if source == destination {
        return Err(Error::SameTable {
            table: destination.clone(),
        });
    }

    for table in [source, destination] {
        if !catalog.table_exists(table).await? {
            return Err(Error::TableNotFound {
                table: table.clone(),
            });
        }
    }

    let key_columns = catalog.key_columns(destination, key_name).await?;
    if key_columns.is_empty() {
        return Err(Error::ConstraintNotFound {
            constraint: key_name.to_owned(),
            table: destination.clone(),
        });
    }

    let source_columns = catalog.columns(source).await?;
    let missing: Vec<ColumnName> = key_columns
        .iter()
        .filter(|key_col| !source_columns.iter().any(|c| &c.name == *key_col))
        .cloned()
        .collect();

    if !missing.is_empty() {
        return Err(Error::PartialKey {
            constraint: key_name.to_owned(),
            table: destination.clone(),
            missing,
        });
    }

    Ok(Checked {
        key: KeyConstraint {
            table: destination.clone(),
            name: key_name.to_owned(),
            columns: key_columns,
        },
        source_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryCatalog;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::default()
            .table(TableRef::new("public", "src"), &["id", "name"])
            .table(TableRef::new("public", "dest"), &["id", "name"])
            .key(TableRef::new("public", "dest"), "dest_pkey", &["id"])
    }

    #[tokio::test]
    async fn test_check_ok() {
        let checked = check(
            &catalog(),
            &TableRef::new("public", "src"),
            &TableRef::new("public", "dest"),
            "dest_pkey",
        )
        .await
        .unwrap();

        assert_eq!(checked.key.columns, vec![ColumnName::from("id")]);
        assert_eq!(checked.key.table, TableRef::new("public", "dest"));
        assert_eq!(checked.source_columns.len(), 2);
    }

    #[tokio::test]
    async fn test_check_same_table() {
        let table = TableRef::new("public", "dest");
        let err = check(&catalog(), &table, &table, "dest_pkey")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SameTable { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_check_same_name_other_schema_is_not_same_table() {
        let catalog = catalog()
            .table(TableRef::new("staging", "dest"), &["id", "name"]);
        let result = check(
            &catalog,
            &TableRef::new("staging", "dest"),
            &TableRef::new("public", "dest"),
            "dest_pkey",
        )
        .await;

        assert!(result.is_ok(), "{result:?}");
    }

    #[tokio::test]
    async fn test_check_missing_source() {
        let err = check(
            &catalog(),
            &TableRef::new("public", "nope"),
            &TableRef::new("public", "dest"),
            "dest_pkey",
        )
        .await
        .unwrap_err();

        match err {
            Error::TableNotFound { table } => assert_eq!(table, TableRef::new("public", "nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_check_missing_destination() {
        let err = check(
            &catalog(),
            &TableRef::new("public", "src"),
            &TableRef::new("public", "nope"),
            "nope_pkey",
        )
        .await
        .unwrap_err();

        match err {
            Error::TableNotFound { table } => assert_eq!(table, TableRef::new("public", "nope")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_check_unknown_constraint() {
        let err = check(
            &catalog(),
            &TableRef::new("public", "src"),
            &TableRef::new("public", "dest"),
            "no_such_key",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ConstraintNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_check_partial_key() {
        let catalog = MemoryCatalog::default()
            .table(TableRef::new("public", "src"), &["tenant_id", "name"])
            .table(TableRef::new("public", "dest"), &["tenant_id", "id", "name"])
            .key(TableRef::new("public", "dest"), "dest_pkey", &["tenant_id", "id"]);

        let err = check(
            &catalog,
            &TableRef::new("public", "src"),
            &TableRef::new("public", "dest"),
            "dest_pkey",
        )
        .await
        .unwrap_err();

        match err {
            Error::PartialKey { missing, .. } => {
                assert_eq!(missing, vec![ColumnName::from("id")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_check_reads_catalog_every_time() {
        let catalog = catalog();
        let src = TableRef::new("public", "src");
        let dest = TableRef::new("public", "dest");

        check(&catalog, &src, &dest, "dest_pkey").await.unwrap();
        let after_first = catalog.reads();
        check(&catalog, &src, &dest, "dest_pkey").await.unwrap();

        assert_eq!(catalog.reads(), after_first * 2);
    }
}
