use std::sync::Arc;

use arrow::datatypes::DataType;
use rustc_hash::FxHashSet;
use strata_result::Result;
use strata_types::Role;

use crate::builder::MutationBuilder;

impl MutationBuilder<'_> {
    /// Leave each table column name on exactly the scope column holding its final value and
    /// clear the names of every other scope column.
    ///
    /// A final value that is still an `excluded` column of an upsert becomes reachable by its
    /// plain name again.
    pub fn disambiguate_columns(&mut self) {
        let mut preserve = FxHashSet::default();
        for ord in 0..self.roles.len() {
            let Some(scope_ord) = self.roles.resolve(ord) else {
                continue;
            };
            preserve.insert(scope_ord);
            let col = self.out_scope.col_mut(scope_ord);
            if col.qualified_only {
                col.name = Some(self.tab.column(ord).name.clone());
                col.table = Some(self.alias.clone());
                col.qualified_only = false;
            }
        }
        self.out_scope.clear_names_except(&preserve);
    }

    /// Project one boolean column per check constraint of the table.
    ///
    /// The columns only compute the result. Rejecting a row whose check is false is left to
    /// whoever executes the plan.
    pub fn add_check_constraint_cols(&mut self) -> Result<()> {
        if self.tab.checks.is_empty() {
            return Ok(());
        }
        self.disambiguate_columns();

        let tab = Arc::clone(&self.tab);
        let mut proj = self.take_scope().project();
        for (i, check) in tab.checks.iter().enumerate() {
            let expr = self.planner.resolver.parse_expr(&check.expr)?;
            let scalar = self.planner.resolver.resolve_and_require_type(
                &expr,
                proj.input_cols(),
                &DataType::Boolean,
            )?;
            let alias = format!("check{}", i + 1);
            let scope_ord = proj.add(self.md, Some(&alias), scalar, DataType::Boolean);
            proj.col_mut(scope_ord).clear_name();
            self.roles.set(i, Role::Check, scope_ord);
        }
        self.out_scope = proj.finish();
        tracing::trace!(
            table = %tab.name,
            checks = tab.checks.len(),
            "added check constraint columns"
        );
        Ok(())
    }
}
