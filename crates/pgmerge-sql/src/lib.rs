//! SQL AST and rendering.
//!
//! Build MERGE and DELETE statements as a typed AST, then render them to a
//! string in one formatting step. Every schema, table, alias and column name
//! goes through [`Ident`] on the way out.

use std::fmt;

use strid::braid;

mod expr;
pub use expr::*;

mod render;
pub use render::*;

mod stmt;
pub use stmt::*;

/// The name of a schema (namespace).
#[braid]
pub struct SchemaName;

/// The name of a table (or table alias).
#[braid]
pub struct TableName;

/// The name of a column.
#[braid]
pub struct ColumnName;

/// A schema-qualified relation.
///
/// Two refs are the same relation iff both parts are byte-equal: the
/// catalog stores unquoted names, so no case folding happens here.
///
/// Display writes the quoted, qualified form.
///
/// # Example
/// ```
/// use pgmerge_sql::TableRef;
/// let table = TableRef::new("public", "order");
/// assert_eq!(table.to_string(), "\"public\".\"order\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: SchemaName,
    pub name: TableName,
}

impl TableRef {
    pub fn new(schema: impl Into<SchemaName>, name: impl Into<TableName>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = Ident(self.schema.as_str());
        let name = Ident(self.name.as_str());
        write!(f, "{schema}.{name}")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use pgmerge_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes, so reserved words (`user`, `order`, `group`) and mixed-case
/// names survive unchanged. Embedded double quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}
