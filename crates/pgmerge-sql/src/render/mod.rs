//! Render SQL AST to string.

use std::fmt;

use crate::Ident;
use crate::expr::{ColumnRef, Expr};
use crate::stmt::*;

/// Wrapper for rendering a `Render` type via `Display`.
///
/// Allows using `write!(f, "{}", Fmt(&expr))` in format strings.
pub struct Fmt<'a, T: Render>(pub &'a T);

impl<T: Render> fmt::Display for Fmt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.render(f)
    }
}

// ============================================================================
// Render implementations
// ============================================================================

/// Trait for types that can be rendered to SQL.
pub trait Render {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Write `items` separated by `", "`.
fn comma_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

impl Render for Expr {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => col.render(f),
            Expr::BinOp { left, op, right } => {
                let left = Fmt(left.as_ref());
                let right = Fmt(right.as_ref());
                let op = op.as_str();
                write!(f, "{left} {op} {right}")
            }
            Expr::Tuple(items) => {
                write!(f, "(")?;
                comma_list(f, items, |f, item| write!(f, "{}", Fmt(item)))?;
                write!(f, ")")
            }
            Expr::InQuery { expr, query } => {
                let expr = Fmt(expr.as_ref());
                let query = Fmt(query.as_ref());
                write!(f, "{expr} IN ({query})")
            }
        }
    }
}

impl Render for ColumnRef {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            let table = Ident(table.as_str());
            write!(f, "{table}.")?;
        }
        let column = Ident(self.column.as_str());
        write!(f, "{column}")
    }
}

impl Render for Query {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Select(select) => select.render(f),
            Query::Except(left, right) => {
                let left = Fmt(left.as_ref());
                let right = Fmt(right.as_ref());
                write!(f, "{left} EXCEPT {right}")
            }
        }
    }
}

impl Render for SelectStmt {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        comma_list(f, &self.columns, |f, col| write!(f, "{}", Ident(col.as_str())))?;
        write!(f, " FROM {}", self.from)
    }
}

impl Render for MergeStmt {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target_alias = Ident(self.target_alias.as_str());
        let source_alias = Ident(self.source_alias.as_str());
        write!(f, "MERGE INTO {} AS {target_alias}", self.target)?;
        write!(f, "\nUSING {} AS {source_alias}", self.source)?;
        write!(f, "\nON {}", Fmt(&self.on))?;

        // WHEN MATCHED
        if let Some(update) = &self.when_matched {
            write!(f, "\nWHEN MATCHED THEN UPDATE SET ")?;
            update.render(f)?;
        }

        // WHEN NOT MATCHED
        if let Some(insert) = &self.when_not_matched {
            write!(f, "\nWHEN NOT MATCHED THEN ")?;
            insert.render(f)?;
        }

        if self.when_matched.is_none() && self.when_not_matched.is_none() {
            write!(f, "\nWHEN MATCHED THEN DO NOTHING")?;
        }

        Ok(())
    }
}

impl Render for MergeUpdate {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A one-element parenthesized target list needs ROW(...) in Postgres,
        // so a single assignment is written in the plain form.
        match self.assignments.as_slice() {
            [single] => {
                let col = Ident(single.column.as_str());
                let val = Fmt(&single.value);
                write!(f, "{col} = {val}")
            }
            assignments => {
                write!(f, "(")?;
                comma_list(f, assignments, |f, a| write!(f, "{}", Ident(a.column.as_str())))?;
                write!(f, ") = (")?;
                comma_list(f, assignments, |f, a| write!(f, "{}", Fmt(&a.value)))?;
                write!(f, ")")
            }
        }
    }
}

impl Render for MergeInsert {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INSERT (")?;
        comma_list(f, &self.columns, |f, col| write!(f, "{}", Ident(col.as_str())))?;
        write!(f, ")")?;
        if self.overriding_system_value {
            write!(f, " OVERRIDING SYSTEM VALUE")?;
        }
        write!(f, " VALUES (")?;
        comma_list(f, &self.values, |f, val| write!(f, "{}", Fmt(val)))?;
        write!(f, ")")
    }
}

impl Render for DeleteStmt {
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DELETE FROM {}", self.table)?;

        // WHERE
        if let Some(where_) = &self.where_ {
            let where_ = Fmt(where_);
            write!(f, "\nWHERE {where_}")?;
        }

        Ok(())
    }
}

// ============================================================================
// Convenience methods
// ============================================================================

/// Render a statement to SQL.
pub fn render(stmt: &impl Render) -> String {
    format!("{}", Fmt(stmt))
}
