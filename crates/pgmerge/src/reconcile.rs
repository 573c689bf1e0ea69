//! The two public operations: `upsert` and `reconcile_deletes`.
//!
//! Every entry point funnels through [`MergeRequest`]: the short forms only
//! leave fields unset, and [`MergeRequest::resolve`] fills them in (current
//! schema, destination primary key) before the full form runs
//! check, build, execute.

use pgmerge_sql::{SchemaName, TableName, TableRef};
use tracing::{debug, info};

use crate::catalog::{Catalog, PgCatalog};
use crate::check::check;
use crate::delete::build_delete;
use crate::execute::Executor;
use crate::merge::build_merge;
use crate::model::{ColumnClassification, GeneratedStatement};
use crate::traced::{Connection, ConnectionExt, TracedConn};
use crate::{Error, Result};

/// A table name with an optional schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub schema: Option<SchemaName>,
    pub name: TableName,
}

impl TableSpec {
    pub fn new(name: impl Into<TableName>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<SchemaName>, name: impl Into<TableName>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Parse `table` or `schema.table`.
    ///
    /// Splits on the first dot; names are taken verbatim, without SQL
    /// unquoting or case folding.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('.') {
            Some((schema, name)) => Self::qualified(schema, name),
            None => Self::new(spec),
        }
    }

    /// Fill in the schema if it is missing.
    pub fn or_schema(mut self, schema: Option<impl Into<SchemaName>>) -> Self {
        if self.schema.is_none() {
            self.schema = schema.map(Into::into);
        }
        self
    }
}

/// Arguments of `upsert` / `reconcile_deletes`, with optional parts.
///
/// Four forms, all ending up in the same full form:
///
/// ```ignore
/// MergeRequest::full("staging", "user", "public", "user", "user_email_key");
/// MergeRequest::new("user_import", "user").with_schemas("staging", "public");
/// MergeRequest::new("user_import", "user").with_key("user_email_key");
/// MergeRequest::new("user_import", "user");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub source: TableSpec,
    pub destination: TableSpec,
    /// Unique or primary-key constraint name; defaults to the destination's
    /// primary key.
    pub key: Option<String>,
}

/// A request with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub source: TableRef,
    pub destination: TableRef,
    pub key: String,
}

impl MergeRequest {
    /// Both schemas default to the current schema, the key to the
    /// destination's primary key.
    pub fn new(source: impl Into<TableName>, destination: impl Into<TableName>) -> Self {
        Self::between(TableSpec::new(source), TableSpec::new(destination))
    }

    pub fn between(source: TableSpec, destination: TableSpec) -> Self {
        Self {
            source,
            destination,
            key: None,
        }
    }

    /// Every argument given, nothing to default.
    pub fn full(
        source_schema: impl Into<SchemaName>,
        source: impl Into<TableName>,
        destination_schema: impl Into<SchemaName>,
        destination: impl Into<TableName>,
        key: impl Into<String>,
    ) -> Self {
        Self::new(source, destination)
            .with_schemas(source_schema, destination_schema)
            .with_key(key)
    }

    pub fn with_schemas(
        mut self,
        source_schema: impl Into<SchemaName>,
        destination_schema: impl Into<SchemaName>,
    ) -> Self {
        self.source.schema = Some(source_schema.into());
        self.destination.schema = Some(destination_schema.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Fill in defaults from the catalog.
    ///
    /// A missing schema becomes the session's current schema
    /// ([`Error::NoCurrentSchema`] if there is none). A missing key becomes
    /// the destination's primary key: [`Error::TableNotFound`] if the
    /// destination does not exist, [`Error::NoKey`] if it has no primary key.
    pub async fn resolve<C: Catalog>(&self, catalog: &C) -> Result<ResolvedRequest> {
        let current = if self.source.schema.is_none() || self.destination.schema.is_none() {
            Some(catalog.current_schema().await?.ok_or(Error::NoCurrentSchema)?)
        } else {
            None
        };

        let qualify = |spec: &TableSpec| -> Result<TableRef> {
            let schema = spec
                .schema
                .clone()
                .or_else(|| current.clone())
                .ok_or(Error::NoCurrentSchema)?;
            Ok(TableRef {
                schema,
                name: spec.name.clone(),
            })
        };
        let source = qualify(&self.source)?;
        let destination = qualify(&self.destination)?;

        let key = match &self.key {
            Some(key) => key.clone(),
            None => {
                if !catalog.table_exists(&destination).await? {
                    return Err(Error::TableNotFound { table: destination });
                }
                catalog
                    .primary_key_name(&destination)
                    .await?
                    .ok_or_else(|| Error::NoKey {
                        table: destination.clone(),
                    })?
            }
        };

        Ok(ResolvedRequest {
            source,
            destination,
            key,
        })
    }
}

/// Result of an executed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub statement: GeneratedStatement,
    pub rows_affected: u64,
}

/// Runs `upsert` and `reconcile_deletes` against a catalog and an executor.
pub struct Reconciler<C, X> {
    catalog: C,
    executor: X,
}

/// A reconciler reading the catalog and running statements on `conn`.
///
/// Pass a `tokio_postgres::Transaction` to make the statement part of the
/// caller's transaction.
pub fn postgres<C: Connection>(conn: &C) -> Reconciler<PgCatalog<'_, C>, TracedConn<'_, C>> {
    Reconciler::new(PgCatalog::new(conn), conn.traced())
}

impl<C: Catalog, X: Executor> Reconciler<C, X> {
    pub fn new(catalog: C, executor: X) -> Self {
        Self { catalog, executor }
    }

    /// Insert source rows missing from the destination and update the
    /// payload of rows whose key matches. Source wins.
    pub async fn upsert(&self, request: &MergeRequest) -> Result<Outcome> {
        let statement = self.plan_upsert(request).await?;
        self.run(statement).await
    }

    /// Delete destination rows whose key no longer exists in the source.
    pub async fn reconcile_deletes(&self, request: &MergeRequest) -> Result<Outcome> {
        let statement = self.plan_reconcile_deletes(request).await?;
        self.run(statement).await
    }

    /// Resolve, check and build the upsert without running it.
    pub async fn plan_upsert(&self, request: &MergeRequest) -> Result<GeneratedStatement> {
        let resolved = request.resolve(&self.catalog).await?;
        self.plan_upsert_resolved(&resolved).await
    }

    /// Resolve, check and build the delete without running it.
    pub async fn plan_reconcile_deletes(
        &self,
        request: &MergeRequest,
    ) -> Result<GeneratedStatement> {
        let resolved = request.resolve(&self.catalog).await?;
        self.plan_reconcile_deletes_resolved(&resolved).await
    }

    async fn plan_upsert_resolved(&self, request: &ResolvedRequest) -> Result<GeneratedStatement> {
        let checked = check(
            &self.catalog,
            &request.source,
            &request.destination,
            &request.key,
        )
        .await?;
        let destination_columns = self.catalog.columns(&request.destination).await?;
        let columns = ColumnClassification::classify(
            &checked.source_columns,
            &destination_columns,
            &checked.key,
        );
        build_merge(&request.source, &checked.key, &columns)
    }

    async fn plan_reconcile_deletes_resolved(
        &self,
        request: &ResolvedRequest,
    ) -> Result<GeneratedStatement> {
        let checked = check(
            &self.catalog,
            &request.source,
            &request.destination,
            &request.key,
        )
        .await?;
        build_delete(&request.source, &checked.key)
    }

    async fn run(&self, statement: GeneratedStatement) -> Result<Outcome> {
        debug!(kind = %statement.kind, sql = %statement.sql, "executing generated statement");
        let rows_affected = self.executor.execute_statement(&statement).await?;
        info!(kind = %statement.kind, rows_affected, "statement applied");
        Ok(Outcome {
            statement,
            rows_affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatementKind;
    use crate::testing::{MemoryCatalog, RecordingExecutor};

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::default()
            .with_current_schema("public")
            .typed_table(
                TableRef::new("public", "item_import"),
                &[("id", "integer"), ("name", "text"), ("batch", "text")],
            )
            .typed_table(
                TableRef::new("public", "item"),
                &[("id", "integer"), ("name", "text"), ("updated_at", "timestamptz")],
            )
            .primary_key(TableRef::new("public", "item"), "item_pkey", &["id"])
            .typed_table(
                TableRef::new("staging", "item"),
                &[("id", "integer"), ("name", "text")],
            )
            .typed_table(TableRef::new("public", "log"), &[("line", "text")])
    }

    #[test]
    fn test_table_spec_parse() {
        assert_eq!(TableSpec::parse("user"), TableSpec::new("user"));
        assert_eq!(
            TableSpec::parse("staging.user"),
            TableSpec::qualified("staging", "user")
        );
        assert_eq!(
            TableSpec::parse("a.b.c"),
            TableSpec::qualified("a", "b.c")
        );
    }

    #[test]
    fn test_table_spec_or_schema_keeps_explicit() {
        let spec = TableSpec::parse("staging.user").or_schema(Some("public"));
        assert_eq!(spec.schema.unwrap().as_str(), "staging");

        let spec = TableSpec::parse("user").or_schema(Some("public"));
        assert_eq!(spec.schema.unwrap().as_str(), "public");

        let spec = TableSpec::parse("user").or_schema(None::<String>);
        assert_eq!(spec.schema, None);
    }

    #[test]
    fn test_full_form_equals_builder_chain() {
        assert_eq!(
            MergeRequest::full("staging", "item", "public", "item", "item_pkey"),
            MergeRequest::new("item", "item")
                .with_schemas("staging", "public")
                .with_key("item_pkey")
        );
    }

    #[tokio::test]
    async fn test_resolve_all_defaults() {
        let resolved = MergeRequest::new("item_import", "item")
            .resolve(&catalog())
            .await
            .unwrap();

        assert_eq!(
            resolved,
            ResolvedRequest {
                source: TableRef::new("public", "item_import"),
                destination: TableRef::new("public", "item"),
                key: "item_pkey".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_resolve_explicit_schemas_skip_current_schema() {
        let catalog = MemoryCatalog::default()
            .typed_table(TableRef::new("public", "item"), &[("id", "integer")])
            .primary_key(TableRef::new("public", "item"), "item_pkey", &["id"]);

        // No current schema configured: would fail if it were consulted.
        let resolved = MergeRequest::new("item", "item")
            .with_schemas("staging", "public")
            .resolve(&catalog)
            .await
            .unwrap();

        assert_eq!(resolved.source, TableRef::new("staging", "item"));
        assert_eq!(resolved.key, "item_pkey");
    }

    #[tokio::test]
    async fn test_resolve_explicit_key_skips_primary_key_lookup() {
        let resolved = MergeRequest::new("item_import", "log")
            .with_key("log_line_key")
            .resolve(&catalog())
            .await
            .unwrap();

        assert_eq!(resolved.key, "log_line_key");
    }

    #[tokio::test]
    async fn test_resolve_no_primary_key() {
        let err = MergeRequest::new("item_import", "log")
            .resolve(&catalog())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoKey { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_resolve_missing_destination_before_key_lookup() {
        let err = MergeRequest::new("item_import", "nope")
            .resolve(&catalog())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TableNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_resolve_no_current_schema() {
        let catalog = MemoryCatalog::default();
        let err = MergeRequest::new("a", "b")
            .with_key("b_pkey")
            .resolve(&catalog)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoCurrentSchema), "{err}");
    }

    #[tokio::test]
    async fn test_upsert_executes_merge() {
        let reconciler = Reconciler::new(catalog(), RecordingExecutor::default());
        let outcome = reconciler
            .upsert(&MergeRequest::new("item_import", "item"))
            .await
            .unwrap();

        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.statement.kind, StatementKind::Merge);
        insta::assert_snapshot!(outcome.statement.sql, @r#"
        MERGE INTO "public"."item" AS "T"
        USING "public"."item_import" AS "S"
        ON "S"."id" = "T"."id"
        WHEN MATCHED THEN UPDATE SET "name" = "S"."name"
        WHEN NOT MATCHED THEN INSERT ("id", "name") VALUES ("S"."id", "S"."name")
        "#);
        assert_eq!(reconciler.executor.executed(), vec![outcome.statement]);
    }

    #[tokio::test]
    async fn test_reconcile_deletes_executes_delete() {
        let reconciler = Reconciler::new(catalog(), RecordingExecutor::default());
        let outcome = reconciler
            .reconcile_deletes(&MergeRequest::full(
                "staging", "item", "public", "item", "item_pkey",
            ))
            .await
            .unwrap();

        assert_eq!(outcome.statement.kind, StatementKind::Delete);
        insta::assert_snapshot!(outcome.statement.sql, @r#"
        DELETE FROM "public"."item"
        WHERE ("id") IN (SELECT "id" FROM "public"."item" EXCEPT SELECT "id" FROM "staging"."item")
        "#);
    }

    #[tokio::test]
    async fn test_same_table_executes_nothing() {
        let reconciler = Reconciler::new(catalog(), RecordingExecutor::default());
        let err = reconciler
            .upsert(&MergeRequest::new("item", "item"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SameTable { .. }), "{err}");
        assert!(reconciler.executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_partial_key_executes_nothing() {
        let catalog = catalog()
            .typed_table(TableRef::new("public", "no_id"), &[("name", "text")]);
        let reconciler = Reconciler::new(catalog, RecordingExecutor::default());

        for result in [
            reconciler.upsert(&MergeRequest::new("no_id", "item")).await,
            reconciler
                .reconcile_deletes(&MergeRequest::new("no_id", "item"))
                .await,
        ] {
            let err = result.unwrap_err();
            assert!(matches!(err, Error::PartialKey { .. }), "{err}");
        }
        assert!(reconciler.executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_plan_does_not_execute() {
        let reconciler = Reconciler::new(catalog(), RecordingExecutor::default());
        let request = MergeRequest::new("item_import", "item");

        let merge = reconciler.plan_upsert(&request).await.unwrap();
        let delete = reconciler.plan_reconcile_deletes(&request).await.unwrap();

        assert_eq!(merge.kind, StatementKind::Merge);
        assert_eq!(delete.kind, StatementKind::Delete);
        assert!(reconciler.executor.executed().is_empty());
    }
}
