use strata_plan::{
    InsertSource, InsertStatement, Metadata, MutationPlan, RelExpr, Scope, ScopeColumn,
    ValueOrDefault, ValuesClause,
};
use strata_result::{Error, Result};
use strata_types::{Role, StatementKind};

use crate::builder::MutationBuilder;
use crate::planner::MutationPlanner;

impl MutationPlanner {
    pub fn plan_insert(&self, md: &mut Metadata, stmt: &InsertStatement) -> Result<MutationPlan> {
        let mut mb = MutationBuilder::new(self, md, StatementKind::Insert, &stmt.table)?;
        mb.build_insert_input(&stmt.columns, &stmt.source)?;
        mb.add_default_and_computed_cols_for_insert()?;
        mb.add_check_constraint_cols()?;
        mb.build_fk_checks_for_insert()?;
        mb.finish(stmt.returning.as_deref())
    }
}

impl MutationBuilder<'_> {
    /// Build the proposed rows of an INSERT or UPSERT.
    ///
    /// Afterwards every target column has an insert value whose scope column is named after
    /// the table column.
    pub fn build_insert_input(&mut self, columns: &[String], source: &InsertSource) -> Result<()> {
        if !columns.is_empty() {
            self.add_target_cols_by_name(columns)?;
        }
        match source {
            InsertSource::Values(values) => {
                if columns.is_empty() {
                    self.add_implicit_target_cols(values.width())?;
                }
                let values = self.replace_default_exprs(values)?;
                self.build_values(&values)?;
            }
            InsertSource::DefaultValues => {
                if !columns.is_empty() {
                    return Err(Error::InvalidArgumentError(
                        "DEFAULT VALUES cannot be combined with a column list".into(),
                    ));
                }
                self.out_scope = Scope::unit();
            }
            InsertSource::Query(query) => {
                let width = query.visible_cols().count();
                if columns.is_empty() {
                    self.add_implicit_target_cols(width)?;
                } else {
                    self.check_num_cols(self.targets.len(), width)?;
                }
                self.adopt_query(query.clone())?;
            }
        }
        tracing::debug!(table = %self.tab.name, targets = self.targets.len(), "built insert input");
        Ok(())
    }

    fn build_values(&mut self, values: &ValuesClause) -> Result<()> {
        let ordinals = (0..self.targets.len())
            .map(|j| self.target_ordinal(j))
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<_> = ordinals
            .iter()
            .enumerate()
            .map(|(j, &ord)| {
                let data_type = self.tab.column(ord).data_type.clone();
                self.md.add_column(format!("column{}", j + 1), data_type)
            })
            .collect();

        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            let mut out = Vec::with_capacity(row.len());
            for (value, &ord) in row.iter().zip(&ordinals) {
                let ValueOrDefault::Expr(expr) = value else {
                    return Err(Error::assertion("DEFAULT left in VALUES after replacement"));
                };
                let col = self.tab.column(ord);
                let typed = self
                    .planner
                    .resolver
                    .resolve(expr, &[], Some(&col.data_type))?;
                self.check_column_type_fits(ord, &typed.data_type)?;
                out.push(typed.expr);
            }
            rows.push(out);
        }

        let cols = ids
            .iter()
            .zip(&ordinals)
            .map(|(&id, &ord)| self.table_scope_col(id, ord))
            .collect();
        self.out_scope = Scope::new(RelExpr::Values { cols: ids, rows }, cols);
        for (j, &ord) in ordinals.iter().enumerate() {
            self.set_role(ord, Role::Insert, j);
        }
        Ok(())
    }

    /// Take over a query source: its visible columns become the insert values of the targets, in
    /// order, and its other columns lose their names.
    fn adopt_query(&mut self, query: Scope) -> Result<()> {
        let (expr, mut cols) = query.into_parts();
        let mut j = 0;
        let mut assigned = Vec::with_capacity(self.targets.len());
        for (scope_ord, col) in cols.iter_mut().enumerate() {
            if !col.is_visible() {
                col.clear_name();
                continue;
            }
            let ord = self.target_ordinal(j)?;
            self.check_column_type_fits(ord, &col.data_type)?;
            let renamed = self.table_scope_col(col.id, ord);
            *col = ScopeColumn {
                data_type: col.data_type.clone(),
                ..renamed
            };
            assigned.push((ord, scope_ord));
            j += 1;
        }
        self.out_scope = Scope::new(expr, cols);
        for (ord, scope_ord) in assigned {
            self.set_role(ord, Role::Insert, scope_ord);
        }
        Ok(())
    }
}
