//! Statement inputs handed to the mutation planner by a statement compiler.
//!
//! User expressions are carried as `sqlparser` ASTs; the planner resolves them against the
//! scopes it builds.

pub use sqlparser::ast::Expr as SqlExpr;

use crate::scope::Scope;

/// A table named by a statement.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
    /// `table@index` hint.
    pub index_hint: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            index_hint: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_index_hint(mut self, index: impl Into<String>) -> Self {
        self.index_hint = Some(index.into());
        self
    }

    /// Name the table's columns are qualified with.
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A value position that may hold the DEFAULT keyword.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueOrDefault {
    Default,
    Expr(SqlExpr),
}

/// Rows of a VALUES clause.
#[derive(Clone, Debug, PartialEq)]
pub struct ValuesClause {
    pub rows: Vec<Vec<ValueOrDefault>>,
}

impl ValuesClause {
    pub fn new(rows: Vec<Vec<ValueOrDefault>>) -> Self {
        Self { rows }
    }

    /// Width of the first row, zero for an empty clause.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn has_default(&self) -> bool {
        self.rows
            .iter()
            .flatten()
            .any(|v| matches!(v, ValueOrDefault::Default))
    }
}

#[derive(Clone, Debug)]
pub enum InsertSource {
    Values(ValuesClause),
    /// `DEFAULT VALUES`: one row, every column from its default.
    DefaultValues,
    /// A query planned by the caller against the same statement metadata.
    Query(Scope),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: ValueOrDefault,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: SqlExpr) -> Self {
        Self {
            column: column.into(),
            value: ValueOrDefault::Expr(value),
        }
    }

    pub fn default(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: ValueOrDefault::Default,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderByItem {
    pub expr: SqlExpr,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReturningItem {
    Star,
    Expr {
        expr: SqlExpr,
        alias: Option<String>,
    },
}

// ============================================================================
// INSERT
// ============================================================================

#[derive(Clone, Debug)]
pub struct InsertStatement {
    pub table: TableRef,
    /// Explicit target columns. Empty means the leading visible columns of the table.
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub returning: Option<Vec<ReturningItem>>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>, source: InsertSource) -> Self {
        Self {
            table: TableRef::new(table),
            columns: Vec::new(),
            source,
            returning: None,
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_returning(mut self, items: Vec<ReturningItem>) -> Self {
        self.returning = Some(items);
        self
    }
}

// ============================================================================
// UPSERT / INSERT ... ON CONFLICT
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ConflictAction {
    /// `UPSERT`: every explicitly targeted non-conflict column takes the proposed value.
    UpsertAll,
    /// `ON CONFLICT (...) DO UPDATE SET ...`. Values may reference `excluded.<col>`.
    DoUpdate(Vec<Assignment>),
}

#[derive(Clone, Debug)]
pub struct UpsertStatement {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub source: InsertSource,
    /// Arbiter columns. Empty means the primary key.
    pub conflict_columns: Vec<String>,
    pub action: ConflictAction,
    pub returning: Option<Vec<ReturningItem>>,
}

impl UpsertStatement {
    pub fn new(table: impl Into<String>, source: InsertSource) -> Self {
        Self {
            table: TableRef::new(table),
            columns: Vec::new(),
            source,
            conflict_columns: Vec::new(),
            action: ConflictAction::UpsertAll,
            returning: None,
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn on_conflict(mut self, columns: &[&str], assignments: Vec<Assignment>) -> Self {
        self.conflict_columns = columns.iter().map(|c| c.to_string()).collect();
        self.action = ConflictAction::DoUpdate(assignments);
        self
    }

    pub fn with_returning(mut self, items: Vec<ReturningItem>) -> Self {
        self.returning = Some(items);
        self
    }
}

// ============================================================================
// UPDATE
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub assignments: Vec<Assignment>,
    pub from: Vec<TableRef>,
    pub filter: Option<SqlExpr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<SqlExpr>,
    pub returning: Option<Vec<ReturningItem>>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>, assignments: Vec<Assignment>) -> Self {
        Self {
            table: TableRef::new(table),
            assignments,
            from: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            returning: None,
        }
    }

    pub fn with_from(mut self, from: Vec<TableRef>) -> Self {
        self.from = from;
        self
    }

    pub fn with_filter(mut self, filter: SqlExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderByItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: SqlExpr) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_returning(mut self, items: Vec<ReturningItem>) -> Self {
        self.returning = Some(items);
        self
    }
}

// ============================================================================
// DELETE
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteStatement {
    pub table: TableRef,
    pub filter: Option<SqlExpr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<SqlExpr>,
    pub returning: Option<Vec<ReturningItem>>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: TableRef::new(table),
            filter: None,
            order_by: Vec::new(),
            limit: None,
            returning: None,
        }
    }

    pub fn with_filter(mut self, filter: SqlExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderByItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: SqlExpr) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_returning(mut self, items: Vec<ReturningItem>) -> Self {
        self.returning = Some(items);
        self
    }
}

/// Any statement the mutation planner accepts.
#[derive(Clone, Debug)]
pub enum MutationStatement {
    Insert(InsertStatement),
    Upsert(UpsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}
