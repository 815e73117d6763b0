//! Shared state of one mutation statement under construction.
//!
//! A [`MutationBuilder`] is created per statement by the drivers in this crate. Its components
//! (input construction, default synthesis, rounding, checks, foreign keys, RETURNING) each
//! append to the working [`Scope`] in turn and record which scope ordinal holds each table
//! column's value in the [`RoleMap`].

use std::mem;
use std::sync::Arc;

use arrow::datatypes::DataType;
use rustc_hash::{FxHashMap, FxHashSet};
use sqlparser::ast::Value;
use strata_catalog::{TableSchema, sql_type_name, types_equivalent};
use strata_plan::{FkCheckItem, Metadata, Scope, ScopeColumn, SqlExpr, TableRef};
use strata_result::{Error, Result};
use strata_types::{ColumnId, Role, ScopeOrdinal, StatementKind, TableId, TableOrdinal, WithId};

use crate::planner::MutationPlanner;
use crate::roles::{RoleMap, TargetColumns};

pub struct MutationBuilder<'a> {
    pub(crate) planner: &'a MutationPlanner,
    pub(crate) md: &'a mut Metadata,
    pub(crate) kind: StatementKind,
    /// Target table schema, captured once for the whole statement.
    pub(crate) tab: Arc<TableSchema>,
    /// Metadata reference whose column ids name the target table's columns.
    pub(crate) tab_id: TableId,
    pub(crate) alias: String,
    pub(crate) index_hint: Option<String>,
    /// Copied from the settings when the builder is created.
    pub(crate) fk_checks_enabled: bool,
    pub(crate) out_scope: Scope,
    pub(crate) roles: RoleMap,
    pub(crate) targets: TargetColumns,
    pub(crate) canary_col: Option<ColumnId>,
    parsed_exprs: FxHashMap<TableOrdinal, SqlExpr>,
    pub(crate) checks: Vec<FkCheckItem>,
    pub(crate) fk_fallback: bool,
    pub(crate) with_id: Option<WithId>,
    /// Not-null columns of the mutation input, computed on first use by the FK checks.
    pub(crate) input_not_null: Option<FxHashSet<ColumnId>>,
    /// UPDATE ... FROM columns visible to RETURNING.
    pub(crate) extra_accessible_cols: Vec<ScopeColumn>,
}

impl<'a> MutationBuilder<'a> {
    /// Resolve the target table and register it in `md`.
    pub fn new(
        planner: &'a MutationPlanner,
        md: &'a mut Metadata,
        kind: StatementKind,
        table: &TableRef,
    ) -> Result<Self> {
        let tab = planner.catalog.resolve_table(&table.name)?;
        if let Some(hint) = &table.index_hint
            && tab.find_index(hint).is_none()
        {
            return Err(Error::UndefinedIndex {
                table: tab.name.clone(),
                index: hint.clone(),
            });
        }
        let alias = table.alias_or_name().to_string();
        let tab_id = md.add_table(Arc::clone(&tab), alias.clone());
        tracing::debug!(table = %tab.name, %alias, %kind, "planning mutation");

        Ok(Self {
            planner,
            md,
            kind,
            roles: RoleMap::new(tab.deletable_column_count(), tab.checks.len()),
            tab,
            tab_id,
            alias,
            index_hint: table.index_hint.clone(),
            fk_checks_enabled: planner.settings.optimizer_fk_checks,
            out_scope: Scope::unit(),
            targets: TargetColumns::new(),
            canary_col: None,
            parsed_exprs: FxHashMap::default(),
            checks: Vec::new(),
            fk_fallback: false,
            with_id: None,
            input_not_null: None,
            extra_accessible_cols: Vec::new(),
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.out_scope
    }

    pub fn roles(&self) -> &RoleMap {
        &self.roles
    }

    pub fn targets(&self) -> &TargetColumns {
        &self.targets
    }

    pub fn table(&self) -> &TableSchema {
        &self.tab
    }

    pub fn table_id(&self) -> TableId {
        self.tab_id
    }

    pub fn checks(&self) -> &[FkCheckItem] {
        &self.checks
    }

    pub fn fk_fallback(&self) -> bool {
        self.fk_fallback
    }

    /// Record that scope column `scope_ord` supplies the `role` value of table column `ord`.
    pub fn set_role(&mut self, ord: TableOrdinal, role: Role, scope_ord: ScopeOrdinal) {
        self.roles.set(ord, role, scope_ord);
    }

    /// Scope ordinal holding the final value of table column `ord`, if any role supplies one.
    pub fn resolve(&self, ord: TableOrdinal) -> Option<ScopeOrdinal> {
        self.roles.resolve(ord)
    }

    /// Take the working scope, leaving a placeholder until the caller puts a new one back.
    pub(crate) fn take_scope(&mut self) -> Scope {
        mem::replace(&mut self.out_scope, Scope::unit())
    }

    pub(crate) fn scope_col_id(&self, ord: ScopeOrdinal) -> ColumnId {
        self.out_scope.col(ord).id
    }

    /// Column id naming table column `ord` of the target table.
    pub(crate) fn table_col_id(&self, ord: TableOrdinal) -> ColumnId {
        self.md.table(self.tab_id).column_id(ord)
    }

    pub(crate) fn table_ordinal(&self, id: ColumnId) -> Result<TableOrdinal> {
        self.md
            .table(self.tab_id)
            .column_ordinal(id)
            .ok_or_else(|| Error::assertion(format!("{id} is not a column of {}", self.tab.name)))
    }

    /// Ordinal of the table column at position `i` of the target list.
    pub(crate) fn target_ordinal(&self, i: usize) -> Result<TableOrdinal> {
        let id = self
            .targets
            .get(i)
            .ok_or_else(|| Error::assertion(format!("no target column at position {i}")))?;
        self.table_ordinal(id)
    }

    /// Add table column `ord` to the explicit target list.
    pub fn add_target_col(&mut self, ord: TableOrdinal) -> Result<()> {
        let col = self.tab.column(ord);
        if col.is_mutation() {
            return Err(Error::ProtectedColumn {
                column: col.name.clone(),
            });
        }
        if col.is_computed() {
            return Err(Error::ComputedColumnWrite {
                column: col.name.clone(),
            });
        }
        let id = self.table_col_id(ord);
        if !self.targets.insert(id) {
            return Err(Error::DuplicateTarget {
                column: col.name.clone(),
            });
        }
        Ok(())
    }

    pub fn add_target_cols_by_name(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let ord = self
                .tab
                .find_column(name)
                .ok_or_else(|| Error::UndefinedColumn(name.clone()))?;
            self.add_target_col(ord)?;
        }
        Ok(())
    }

    /// Target the first `max_cols` visible public columns, as an INSERT without a column list
    /// does.
    pub(crate) fn add_implicit_target_cols(&mut self, max_cols: usize) -> Result<()> {
        let mut added = 0;
        for ord in 0..self.tab.column_count() {
            if added == max_cols {
                break;
            }
            if self.tab.column(ord).hidden {
                continue;
            }
            self.add_target_col(ord)?;
            added += 1;
        }
        self.check_num_cols(self.targets.len(), max_cols)
    }

    pub(crate) fn check_num_cols(&self, expected: usize, actual: usize) -> Result<()> {
        if expected != actual {
            return Err(Error::Arity {
                op: self.kind.keyword().to_string(),
                actual,
                expected,
            });
        }
        Ok(())
    }

    pub(crate) fn check_column_type_fits(
        &self,
        ord: TableOrdinal,
        value_type: &DataType,
    ) -> Result<()> {
        let col = self.tab.column(ord);
        if types_equivalent(value_type, &col.data_type) {
            return Ok(());
        }
        Err(Error::type_mismatch(
            sql_type_name(value_type),
            sql_type_name(&col.data_type),
            col.name.clone(),
        ))
    }

    /// Parsed computed expression of column `ord`, else its default, else NULL. Cached per
    /// column for the lifetime of the builder.
    pub(crate) fn parse_default_or_computed_expr(&mut self, ord: TableOrdinal) -> Result<SqlExpr> {
        if let Some(expr) = self.parsed_exprs.get(&ord) {
            return Ok(expr.clone());
        }
        let col = self.tab.column(ord);
        let text = match (&col.computed_expr, &col.default_expr) {
            (Some(computed), _) => computed,
            (None, Some(default)) => default,
            (None, None) => return Ok(SqlExpr::Value(Value::Null.with_empty_span())),
        };
        let expr = self.planner.resolver.parse_expr(text)?;
        self.parsed_exprs.insert(ord, expr.clone());
        Ok(expr)
    }

    /// Scope column for table column `ord`, named the way expressions refer to it.
    pub(crate) fn table_scope_col(&self, id: ColumnId, ord: TableOrdinal) -> ScopeColumn {
        let col = self.tab.column(ord);
        ScopeColumn::new(id, col.name.clone(), col.data_type.clone())
            .with_table(self.alias.clone())
            .with_hidden(col.hidden)
            .with_mutation(col.is_mutation())
    }
}
