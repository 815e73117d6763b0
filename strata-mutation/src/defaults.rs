//! DEFAULT replacement and synthesis of columns the statement does not supply.

use std::borrow::Cow;

use rustc_hash::FxHashSet;
use strata_catalog::ColumnSchema;
use strata_plan::{Projection, ValueOrDefault, ValuesClause};
use strata_result::{Error, Result};
use strata_sql::column_refs;
use strata_types::{Role, TableOrdinal};

use crate::builder::MutationBuilder;

impl MutationBuilder<'_> {
    /// Replace each `DEFAULT` in `values` with the default (or computed) expression of the
    /// target column at the same position.
    ///
    /// The replacement is syntactic. A clause without `DEFAULT` is returned borrowed and
    /// unchanged. Fails if the width differs from the target list or the rows are ragged.
    pub fn replace_default_exprs<'v>(
        &mut self,
        values: &'v ValuesClause,
    ) -> Result<Cow<'v, ValuesClause>> {
        let num_cols = values.width();
        self.check_num_cols(self.targets.len(), num_cols)?;
        if let Some(row) = values.rows.iter().find(|row| row.len() != num_cols) {
            return Err(Error::ValuesLength {
                expected: num_cols,
                found: row.len(),
            });
        }
        if !values.has_default() {
            return Ok(Cow::Borrowed(values));
        }

        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            let mut new_row = Vec::with_capacity(num_cols);
            for (i, value) in row.iter().enumerate() {
                new_row.push(match value {
                    ValueOrDefault::Default => {
                        let ord = self.target_ordinal(i)?;
                        ValueOrDefault::Expr(self.parse_default_or_computed_expr(ord)?)
                    }
                    other => other.clone(),
                });
            }
            rows.push(new_row);
        }
        Ok(Cow::Owned(ValuesClause::new(rows)))
    }

    /// Append one projection layer holding a synthesized value for every writable column that
    /// has no `role` value yet and satisfies `add_col`.
    ///
    /// Each value is the column's computed expression, else its default, else NULL, resolved
    /// against the current scope and required to match the column type. New columns are named
    /// after their table column so later computed expressions can refer to them.
    pub fn add_synthesized_cols(
        &mut self,
        role: Role,
        add_col: impl Fn(TableOrdinal, &ColumnSchema) -> bool,
    ) -> Result<()> {
        let mut projection: Option<Projection> = None;
        for ord in 0..self.tab.writable_column_count() {
            if self.roles.get(ord, role).is_some() || !add_col(ord, self.tab.column(ord)) {
                continue;
            }
            let expr = self.parse_default_or_computed_expr(ord)?;
            let proj = projection.get_or_insert_with(|| self.take_scope().project());
            let col = self.tab.column(ord);
            let scalar = self.planner.resolver.resolve_and_require_type(
                &expr,
                proj.input_cols(),
                &col.data_type,
            )?;
            let scope_ord = proj.add(self.md, Some(&col.name), scalar, col.data_type.clone());
            let scope_col = proj.col_mut(scope_ord);
            scope_col.table = Some(self.alias.clone());
            scope_col.mutation = col.is_mutation();

            self.roles.set(ord, role, scope_ord);
            let id = self.table_col_id(ord);
            self.targets.insert(id);
        }

        if let Some(proj) = projection {
            tracing::trace!(table = %self.tab.name, role = role.as_str(), "synthesized columns");
            self.out_scope = proj.finish();
        }
        Ok(())
    }

    /// Fill in every column an INSERT (or the insert half of an UPSERT) did not supply.
    ///
    /// Defaults come first so computed expressions can read them, and each group is rounded
    /// before anything downstream reads it.
    pub fn add_default_and_computed_cols_for_insert(&mut self) -> Result<()> {
        self.add_synthesized_cols(Role::Insert, |_, col| !col.is_computed())?;
        self.round_decimal_values(Role::Insert, false);
        self.add_synthesized_cols(Role::Insert, |_, col| col.is_computed())?;
        self.round_decimal_values(Role::Insert, true);
        Ok(())
    }

    /// Recompute the computed columns whose expressions reference an updated column.
    pub fn add_computed_cols_for_update(&mut self) -> Result<()> {
        // References in computed expressions must reach the final values only.
        self.disambiguate_columns();

        let updated: FxHashSet<String> = (0..self.tab.writable_column_count())
            .filter(|&ord| self.roles.get(ord, Role::Update).is_some())
            .map(|ord| self.tab.column(ord).name.to_ascii_lowercase())
            .collect();
        if updated.is_empty() {
            return Ok(());
        }

        let mut recompute = FxHashSet::default();
        for ord in 0..self.tab.writable_column_count() {
            if !self.tab.column(ord).is_computed() {
                continue;
            }
            let expr = self.parse_default_or_computed_expr(ord)?;
            if column_refs(&expr).iter().any(|name| updated.contains(name)) {
                recompute.insert(ord);
            }
        }

        self.add_synthesized_cols(Role::Update, |ord, _| recompute.contains(&ord))?;
        self.round_decimal_values(Role::Update, true);
        Ok(())
    }
}
