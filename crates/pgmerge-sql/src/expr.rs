//! SQL expressions.

use crate::stmt::Query;
use crate::{ColumnName, TableName};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference
    Column(ColumnRef),
    /// Binary operation (e.g., a = b, a AND b)
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// Parenthesized list / row constructor: (a, b)
    Tuple(Vec<Expr>),
    /// expr IN (subquery)
    InQuery { expr: Box<Expr>, query: Box<Query> },
}

/// A column reference, optionally qualified with table/alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<TableName>,
    pub column: ColumnName,
}

impl ColumnRef {
    pub fn new(column: ColumnName) -> Self {
        Self {
            table: None,
            column,
        }
    }

    pub fn qualified(table: TableName, column: ColumnName) -> Self {
        Self {
            table: Some(table),
            column,
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    And,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::And => "AND",
        }
    }
}

// Convenience constructors
impl Expr {
    pub fn column(name: ColumnName) -> Self {
        Expr::Column(ColumnRef::new(name))
    }

    pub fn qualified_column(table: TableName, column: ColumnName) -> Self {
        Expr::Column(ColumnRef::qualified(table, column))
    }

    pub fn tuple(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Tuple(items.into_iter().collect())
    }

    /// Create an equality expression: self = other
    pub fn eq(self, other: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(self),
            op: BinOp::Eq,
            right: Box::new(other),
        }
    }

    /// Create an AND expression: self AND other
    pub fn and(self, other: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(self),
            op: BinOp::And,
            right: Box::new(other),
        }
    }

    /// Create an IN expression: self IN (query)
    pub fn in_query(self, query: Query) -> Self {
        Expr::InQuery {
            expr: Box::new(self),
            query: Box::new(query),
        }
    }

    /// Fold conditions into a left-nested AND chain.
    ///
    /// Returns `None` for an empty iterator.
    pub fn all(conditions: impl IntoIterator<Item = Expr>) -> Option<Self> {
        conditions.into_iter().reduce(Expr::and)
    }
}
