//! SQL statements.

use crate::expr::Expr;
use crate::{ColumnName, TableName, TableRef};

// ============================================================================
// Queries (subquery position only)
// ============================================================================

/// A query usable as a subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectStmt),
    /// left EXCEPT right
    Except(Box<Query>, Box<Query>),
}

impl Query {
    pub fn except(self, other: Query) -> Self {
        Query::Except(Box::new(self), Box::new(other))
    }
}

/// A plain projection: SELECT cols FROM table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub columns: Vec<ColumnName>,
    pub from: TableRef,
}

impl SelectStmt {
    pub fn new(from: TableRef) -> Self {
        Self {
            columns: Vec::new(),
            from,
        }
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnName>) -> Self {
        self.columns.extend(cols);
        self
    }
}

impl From<SelectStmt> for Query {
    fn from(select: SelectStmt) -> Self {
        Query::Select(select)
    }
}

// ============================================================================
// MERGE statement
// ============================================================================

/// A MERGE statement.
#[derive(Debug, Clone)]
pub struct MergeStmt {
    pub target: TableRef,
    pub target_alias: TableName,
    pub source: TableRef,
    pub source_alias: TableName,
    pub on: Expr,
    /// WHEN MATCHED THEN UPDATE SET ...; omitted entirely when `None`.
    pub when_matched: Option<MergeUpdate>,
    /// WHEN NOT MATCHED THEN INSERT ...; omitted entirely when `None`.
    ///
    /// With neither action the statement renders `WHEN MATCHED THEN DO
    /// NOTHING`, since MERGE needs at least one WHEN clause.
    pub when_not_matched: Option<MergeInsert>,
}

/// The UPDATE action of a WHEN MATCHED clause.
#[derive(Debug, Clone, Default)]
pub struct MergeUpdate {
    pub assignments: Vec<UpdateAssignment>,
}

impl MergeUpdate {
    pub fn set(mut self, column: ColumnName, value: Expr) -> Self {
        self.assignments.push(UpdateAssignment::new(column, value));
        self
    }
}

/// The INSERT action of a WHEN NOT MATCHED clause.
#[derive(Debug, Clone, Default)]
pub struct MergeInsert {
    pub columns: Vec<ColumnName>,
    pub values: Vec<Expr>,
    /// INSERT (...) OVERRIDING SYSTEM VALUE VALUES (...), required to write
    /// `GENERATED ALWAYS AS IDENTITY` columns.
    pub overriding_system_value: bool,
}

impl MergeInsert {
    pub fn column(mut self, name: ColumnName, value: Expr) -> Self {
        self.columns.push(name);
        self.values.push(value);
        self
    }

    pub fn overriding_system_value(mut self, overriding: bool) -> Self {
        self.overriding_system_value = overriding;
        self
    }
}

/// An assignment in UPDATE SET.
#[derive(Debug, Clone)]
pub struct UpdateAssignment {
    pub column: ColumnName,
    pub value: Expr,
}

impl UpdateAssignment {
    pub fn new(column: ColumnName, value: Expr) -> Self {
        Self { column, value }
    }
}

// ============================================================================
// DELETE statement
// ============================================================================

/// A DELETE statement.
#[derive(Debug, Clone)]
pub struct DeleteStmt {
    pub table: TableRef,
    pub where_: Option<Expr>,
}

// ============================================================================
// Builder-style constructors
// ============================================================================

impl MergeStmt {
    /// Start a MERGE of `source` (aliased `source_alias`) into `target`
    /// (aliased `target_alias`), matching on `on`.
    pub fn new(
        target: TableRef,
        target_alias: TableName,
        source: TableRef,
        source_alias: TableName,
        on: Expr,
    ) -> Self {
        Self {
            target,
            target_alias,
            source,
            source_alias,
            on,
            when_matched: None,
            when_not_matched: None,
        }
    }

    pub fn when_matched(mut self, update: MergeUpdate) -> Self {
        self.when_matched = Some(update);
        self
    }

    pub fn when_not_matched(mut self, insert: MergeInsert) -> Self {
        self.when_not_matched = Some(insert);
        self
    }
}

impl DeleteStmt {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            where_: None,
        }
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }
}
