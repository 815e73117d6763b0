use strata_plan::{Assignment, Metadata, MutationPlan, UpdateStatement, ValueOrDefault};
use strata_result::{Error, Result};
use strata_types::{Role, StatementKind};

use crate::builder::MutationBuilder;
use crate::input::InputClauses;
use crate::planner::MutationPlanner;

impl MutationPlanner {
    pub fn plan_update(&self, md: &mut Metadata, stmt: &UpdateStatement) -> Result<MutationPlan> {
        let mut mb = MutationBuilder::new(self, md, StatementKind::Update, &stmt.table)?;
        mb.build_input(InputClauses {
            from: &stmt.from,
            filter: stmt.filter.as_ref(),
            order_by: &stmt.order_by,
            limit: stmt.limit.as_ref(),
        })?;
        mb.add_update_cols(&stmt.assignments)?;
        mb.add_check_constraint_cols()?;
        mb.build_fk_checks_for_update()?;
        mb.finish(stmt.returning.as_deref())
    }
}

impl MutationBuilder<'_> {
    /// Project the SET values of an UPDATE (or of an upsert's DO UPDATE) as update values.
    ///
    /// Values resolve against the current scope, so they read the fetched row, FROM columns
    /// and, for upserts, the `excluded` row. A `DEFAULT` value becomes the column's default
    /// expression. Rounding and recomputation of affected computed columns follow.
    pub fn add_update_cols(&mut self, assignments: &[Assignment]) -> Result<()> {
        let mut ordinals = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let ord = self
                .tab
                .find_column(&assignment.column)
                .ok_or_else(|| Error::UndefinedColumn(assignment.column.clone()))?;
            self.add_target_col(ord)?;
            ordinals.push(ord);
        }

        let mut proj = self.take_scope().project();
        for (assignment, &ord) in assignments.iter().zip(&ordinals) {
            let expr = match &assignment.value {
                ValueOrDefault::Expr(expr) => expr.clone(),
                ValueOrDefault::Default => self.parse_default_or_computed_expr(ord)?,
            };
            let col = self.tab.column(ord);
            let typed = self
                .planner
                .resolver
                .resolve(&expr, proj.input_cols(), Some(&col.data_type))?;
            self.check_column_type_fits(ord, &typed.data_type)?;

            let col = self.tab.column(ord);
            let scope_ord = proj.add(self.md, Some(&col.name), typed.expr, col.data_type.clone());
            proj.col_mut(scope_ord).table = Some(self.alias.clone());
            self.roles.set(ord, Role::Update, scope_ord);
        }
        self.out_scope = proj.finish();
        tracing::debug!(
            table = %self.tab.name,
            assignments = assignments.len(),
            "added update columns"
        );

        self.round_decimal_values(Role::Update, false);
        self.add_computed_cols_for_update()
    }
}
