//! In-memory catalog and recording executor for unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use pgmerge_sql::{ColumnName, SchemaName, TableRef};

use crate::Result;
use crate::catalog::Catalog;
use crate::execute::Executor;
use crate::model::{CatalogColumn, GeneratedStatement};

struct MemoryKey {
    name: String,
    columns: Vec<ColumnName>,
    primary: bool,
}

#[derive(Default)]
pub(crate) struct MemoryCatalog {
    tables: HashMap<TableRef, Vec<CatalogColumn>>,
    keys: HashMap<TableRef, Vec<MemoryKey>>,
    current_schema: Option<SchemaName>,
    reads: AtomicUsize,
}

impl MemoryCatalog {
    /// Add a table whose columns are all `text`.
    pub fn table(self, table: TableRef, columns: &[&str]) -> Self {
        let typed: Vec<(&str, &str)> = columns.iter().map(|c| (*c, "text")).collect();
        self.typed_table(table, &typed)
    }

    pub fn typed_table(self, table: TableRef, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, ty)| CatalogColumn::new(*name, *ty))
            .collect();
        self.catalog_table(table, columns)
    }

    pub fn catalog_table(mut self, table: TableRef, columns: Vec<CatalogColumn>) -> Self {
        self.tables.insert(table, columns);
        self
    }

    /// Add a unique constraint.
    pub fn key(self, table: TableRef, name: &str, columns: &[&str]) -> Self {
        self.add_key(table, name, columns, false)
    }

    pub fn primary_key(self, table: TableRef, name: &str, columns: &[&str]) -> Self {
        self.add_key(table, name, columns, true)
    }

    pub fn with_current_schema(mut self, schema: &str) -> Self {
        self.current_schema = Some(schema.into());
        self
    }

    /// Number of catalog calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn add_key(mut self, table: TableRef, name: &str, columns: &[&str], primary: bool) -> Self {
        self.keys.entry(table).or_default().push(MemoryKey {
            name: name.to_owned(),
            columns: columns.iter().map(|c| (*c).into()).collect(),
            primary,
        });
        self
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

impl Catalog for MemoryCatalog {
    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        self.read();
        Ok(self.tables.contains_key(table))
    }

    async fn columns(&self, table: &TableRef) -> Result<Vec<CatalogColumn>> {
        self.read();
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    async fn key_columns(&self, table: &TableRef, constraint: &str) -> Result<Vec<ColumnName>> {
        self.read();
        Ok(self
            .keys
            .get(table)
            .and_then(|keys| keys.iter().find(|k| k.name == constraint))
            .map(|k| k.columns.clone())
            .unwrap_or_default())
    }

    async fn primary_key_name(&self, table: &TableRef) -> Result<Option<String>> {
        self.read();
        Ok(self
            .keys
            .get(table)
            .and_then(|keys| keys.iter().find(|k| k.primary))
            .map(|k| k.name.clone()))
    }

    async fn current_schema(&self) -> Result<Option<SchemaName>> {
        self.read();
        Ok(self.current_schema.clone())
    }
}

/// Records statements instead of running them.
#[derive(Default)]
pub(crate) struct RecordingExecutor {
    executed: Mutex<Vec<GeneratedStatement>>,
}

impl RecordingExecutor {
    pub fn executed(&self) -> Vec<GeneratedStatement> {
        self.executed.lock().unwrap().clone()
    }
}

impl Executor for RecordingExecutor {
    async fn execute_statement(&self, statement: &GeneratedStatement) -> Result<u64> {
        self.executed.lock().unwrap().push(statement.clone());
        Ok(1)
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a subscriber that records every event at `debug` and above,
/// and return what it wrote.
pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
