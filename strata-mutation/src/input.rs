//! Read side of UPDATE and DELETE: the rows a statement mutates.

use std::sync::Arc;

use arrow::datatypes::DataType;
use rustc_hash::FxHashSet;
use strata_catalog::TableSchema;
use strata_expr::ScalarExpr;
use strata_plan::{
    JoinKind, OrderByItem, OrderingColumn, RelExpr, ScanExpr, Scope, ScopeColumn, SqlExpr,
    TableRef,
};
use strata_result::{Error, Result};
use strata_types::{Role, TableId};

use crate::builder::MutationBuilder;

/// Clauses shaping the input of an UPDATE or DELETE.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputClauses<'s> {
    pub from: &'s [TableRef],
    pub filter: Option<&'s SqlExpr>,
    pub order_by: &'s [OrderByItem],
    pub limit: Option<&'s SqlExpr>,
}

impl MutationBuilder<'_> {
    /// Scan every column of a fresh reference to the target table, mutation-only columns
    /// included. Scope ordinal `i` holds table column `i`.
    pub(crate) fn build_target_scan(&mut self) -> (TableId, Scope) {
        let scan_tab = self.md.add_table(Arc::clone(&self.tab), self.alias.clone());
        let n = self.tab.deletable_column_count();
        let mut ids = Vec::with_capacity(n);
        let mut cols = Vec::with_capacity(n);
        for ord in 0..n {
            let id = self.md.table(scan_tab).column_id(ord);
            ids.push(id);
            cols.push(self.table_scope_col(id, ord));
        }
        let scan = RelExpr::Scan(ScanExpr {
            table: scan_tab,
            cols: ids,
            index_hint: self.index_hint.clone(),
            ignore_foreign_keys: false,
        });
        (scan_tab, Scope::new(scan, cols))
    }

    /// Build the input rows of an UPDATE (with `from`) or DELETE (without).
    ///
    /// Afterwards every target table column has a fetch value at the scope ordinal equal to its
    /// table ordinal.
    pub fn build_input(&mut self, clauses: InputClauses<'_>) -> Result<()> {
        let (_, mut scope) = self.build_target_scan();
        let num_cols = scope.len();

        if !clauses.from.is_empty() {
            let from_scope = self.build_from_tables(clauses.from)?;
            self.extra_accessible_cols = from_scope.cols().to_vec();
            scope = scope.join(JoinKind::Inner, from_scope, Vec::new());
        }

        if let Some(filter) = clauses.filter {
            let predicate = self.planner.resolver.resolve_and_require_type(
                filter,
                scope.cols(),
                &DataType::Boolean,
            )?;
            scope = scope.wrap(|input| RelExpr::Select {
                input: Box::new(input),
                filter: predicate,
            });
        }

        if !clauses.order_by.is_empty() {
            scope = self.build_order_by(scope, clauses.order_by)?;
        }

        if let Some(limit) = clauses.limit {
            let limit =
                self.planner
                    .resolver
                    .resolve_and_require_type(limit, &[], &DataType::Int64)?;
            scope = scope.wrap(|input| RelExpr::Limit {
                input: Box::new(input),
                limit,
            });
        }

        if !clauses.from.is_empty() {
            // One row per target row: keep the first joined row of each primary key group.
            let grouping: Vec<_> = self
                .tab
                .primary_index
                .key_columns
                .iter()
                .map(|&ord| scope.col(ord))
                .filter(|col| !col.hidden)
                .map(|col| col.id)
                .collect();
            if !grouping.is_empty() {
                scope = scope.wrap(|input| RelExpr::DistinctOn {
                    input: Box::new(input),
                    grouping,
                    error_on_duplicate: None,
                    nulls_distinct: false,
                });
            }
        }

        self.out_scope = scope;
        for ord in 0..num_cols {
            self.set_role(ord, Role::Fetch, ord);
        }
        tracing::debug!(
            table = %self.tab.name,
            from = clauses.from.len(),
            "built mutation input"
        );
        Ok(())
    }

    /// Scan and cross join the FROM sources, rejecting aliases that repeat the target's or
    /// each other's.
    fn build_from_tables(&mut self, from: &[TableRef]) -> Result<Scope> {
        let mut seen = FxHashSet::default();
        seen.insert(self.alias.to_ascii_lowercase());

        let mut joined: Option<Scope> = None;
        for table_ref in from {
            let alias = table_ref.alias_or_name().to_string();
            if !seen.insert(alias.to_ascii_lowercase()) {
                return Err(Error::DuplicateTableAlias(alias));
            }
            let schema = self.planner.catalog.resolve_table(&table_ref.name)?;
            self.planner.privileges.check_select(&schema)?;
            let scope = self.build_source_scan(schema, &alias, table_ref.index_hint.clone())?;
            joined = Some(match joined {
                None => scope,
                Some(left) => left.join(JoinKind::Inner, scope, Vec::new()),
            });
        }
        joined.ok_or_else(|| Error::assertion("FROM clause without sources"))
    }

    /// Scan the public columns of a non-target table.
    fn build_source_scan(
        &mut self,
        schema: Arc<TableSchema>,
        alias: &str,
        index_hint: Option<String>,
    ) -> Result<Scope> {
        if let Some(hint) = &index_hint
            && schema.find_index(hint).is_none()
        {
            return Err(Error::UndefinedIndex {
                table: schema.name.clone(),
                index: hint.clone(),
            });
        }
        let tab = self.md.add_table(Arc::clone(&schema), alias);
        let mut ids = Vec::new();
        let mut cols = Vec::new();
        for ord in 0..schema.column_count() {
            let col = schema.column(ord);
            let id = self.md.table(tab).column_id(ord);
            ids.push(id);
            cols.push(
                ScopeColumn::new(id, col.name.clone(), col.data_type.clone())
                    .with_table(alias)
                    .with_hidden(col.hidden),
            );
        }
        Ok(Scope::new(
            RelExpr::Scan(ScanExpr {
                table: tab,
                cols: ids,
                index_hint,
                ignore_foreign_keys: false,
            }),
            cols,
        ))
    }

    /// Sort `scope`. Keys that are not plain column references are projected as extra
    /// anonymous columns first.
    fn build_order_by(&mut self, scope: Scope, order_by: &[OrderByItem]) -> Result<Scope> {
        let mut proj = scope.project();
        let mut ordering = Vec::with_capacity(order_by.len());
        for item in order_by {
            let typed = self
                .planner
                .resolver
                .resolve(&item.expr, proj.input_cols(), None)?;
            let column = match typed.expr {
                ScalarExpr::Column(id) => id,
                expr => {
                    let ord = proj.add(self.md, None, expr, typed.data_type);
                    proj.cols()[ord].id
                }
            };
            ordering.push(OrderingColumn {
                column,
                descending: item.descending,
            });
        }
        Ok(proj.finish().wrap(|input| RelExpr::Sort {
            input: Box::new(input),
            ordering,
        }))
    }
}
