//! UPSERT and INSERT ... ON CONFLICT DO UPDATE.
//!
//! The proposed rows are left-joined against the target table on the conflict columns. Rows
//! without a match are inserted, the others updated, and the canary column (a NOT NULL key
//! column of the fetched side) tells the two apart at execution time.

use strata_expr::ScalarExpr;
use strata_plan::{ConflictAction, JoinKind, Metadata, MutationPlan, RelExpr, UpsertStatement};
use strata_result::{Error, Result};
use strata_types::{Role, StatementKind, TableOrdinal};

use crate::builder::MutationBuilder;
use crate::planner::MutationPlanner;

/// Qualifier of the proposed row in DO UPDATE expressions.
pub const EXCLUDED: &str = "excluded";

const DUPLICATE_KEY_MSG: &str =
    "UPSERT or INSERT...ON CONFLICT command cannot affect row a second time";

impl MutationPlanner {
    pub fn plan_upsert(&self, md: &mut Metadata, stmt: &UpsertStatement) -> Result<MutationPlan> {
        let mut mb = MutationBuilder::new(self, md, StatementKind::Upsert, &stmt.table)?;
        mb.build_insert_input(&stmt.columns, &stmt.source)?;
        mb.add_default_and_computed_cols_for_insert()?;
        let conflict = mb.build_upsert_input(&stmt.conflict_columns)?;
        match &stmt.action {
            ConflictAction::UpsertAll => {
                mb.set_upsert_all_cols(&stmt.columns, &conflict);
                mb.add_computed_cols_for_update()?;
            }
            ConflictAction::DoUpdate(assignments) => {
                mb.targets.clear();
                mb.add_update_cols(assignments)?;
            }
        }
        mb.project_upsert_cols()?;
        mb.add_check_constraint_cols()?;
        mb.build_fk_checks_for_upsert()?;
        mb.finish(stmt.returning.as_deref())
    }
}

impl MutationBuilder<'_> {
    /// Ordinals of the arbiter columns, defaulting to the primary key.
    fn conflict_ordinals(&self, names: &[String]) -> Result<Vec<TableOrdinal>> {
        if names.is_empty() {
            return Ok(self.tab.primary_index.key_columns.clone());
        }
        let ordinals = names
            .iter()
            .map(|name| {
                self.tab
                    .find_column(name)
                    .filter(|&ord| ord < self.tab.column_count())
                    .ok_or_else(|| Error::UndefinedColumn(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        if !self.tab.is_unique_key(&ordinals) {
            return Err(Error::InvalidArgumentError(
                "there is no unique or exclusion constraint matching the ON CONFLICT specification"
                    .into(),
            ));
        }
        Ok(ordinals)
    }

    /// Join the proposed rows to the existing rows sharing their conflict key.
    ///
    /// The proposed values stay reachable as `excluded.<column>`. The fetched row follows them,
    /// with table column `i` at scope ordinal `n + i` where `n` is the width of the proposed row.
    /// Returns the ordinals of the conflict columns.
    pub fn build_upsert_input(
        &mut self,
        conflict_columns: &[String],
    ) -> Result<Vec<TableOrdinal>> {
        let conflict = self.conflict_ordinals(conflict_columns)?;
        let mut insert_cols = Vec::with_capacity(conflict.len());
        for &ord in &conflict {
            let scope_ord = self.roles.get(ord, Role::Insert).ok_or_else(|| {
                Error::assertion(format!(
                    "no insert value for conflict column \"{}\"",
                    self.tab.column(ord).name
                ))
            })?;
            insert_cols.push(self.scope_col_id(scope_ord));
        }

        let mut proposed = self.take_scope();
        for ord in 0..proposed.len() {
            let col = proposed.col_mut(ord);
            if col.name.is_some() {
                col.qualify_only(EXCLUDED);
            }
        }
        // NULL keys never conflict, neither with stored rows nor with each other.
        let grouping = insert_cols.clone();
        let proposed = proposed.wrap(|input| RelExpr::DistinctOn {
            input: Box::new(input),
            grouping,
            error_on_duplicate: Some(DUPLICATE_KEY_MSG.to_string()),
            nulls_distinct: true,
        });

        let left_len = proposed.len();
        let (_, existing) = self.build_target_scan();
        let on = conflict
            .iter()
            .zip(&insert_cols)
            .map(|(&ord, &ins)| ScalarExpr::columns_eq(ins, existing.col(ord).id))
            .collect();
        self.out_scope = proposed.join(JoinKind::LeftOuter, existing, on);
        for ord in 0..self.tab.deletable_column_count() {
            self.set_role(ord, Role::Fetch, left_len + ord);
        }

        let canary_ord = self
            .tab
            .primary_index
            .key_columns
            .iter()
            .copied()
            .find(|&ord| !self.tab.column(ord).nullable)
            .ok_or_else(|| Error::assertion("primary key has no NOT NULL column"))?;
        self.canary_col = Some(self.scope_col_id(left_len + canary_ord));

        tracing::debug!(
            table = %self.tab.name,
            conflict_cols = conflict.len(),
            "built upsert input"
        );
        Ok(conflict)
    }

    /// Update the named columns (every insert column when `columns` is empty) to their proposed
    /// values. Key, conflict and mutation-only columns keep their fetched values, and computed
    /// columns are left to recomputation.
    pub fn set_upsert_all_cols(&mut self, columns: &[String], conflict: &[TableOrdinal]) {
        let named: Vec<TableOrdinal> = columns
            .iter()
            .filter_map(|name| self.tab.find_column(name))
            .collect();
        let key = &self.tab.primary_index.key_columns;
        let mut count = 0;
        for ord in 0..self.tab.column_count() {
            let Some(scope_ord) = self.roles.get(ord, Role::Insert) else {
                continue;
            };
            let col = self.tab.column(ord);
            let fixed = key.contains(&ord) || conflict.contains(&ord) || col.is_mutation();
            if fixed || col.is_computed() {
                continue;
            }
            if !named.is_empty() && !named.contains(&ord) {
                continue;
            }
            self.roles.set(ord, Role::Update, scope_ord);
            count += 1;
        }
        tracing::trace!(table = %self.tab.name, count, "upsert updates proposed values");
    }

    /// Project `CASE WHEN canary IS NULL THEN insert ELSE update END` for every column whose
    /// insert value and update (or fetched) value differ.
    pub fn project_upsert_cols(&mut self) -> Result<()> {
        let canary = self
            .canary_col
            .ok_or_else(|| Error::assertion("upsert without a canary column"))?;

        let mut proj = self.take_scope().project();
        for ord in 0..self.tab.writable_column_count() {
            let roles = *self.roles.column(ord);
            let (Some(ins), Some(upd)) = (roles.insert, roles.update.or(roles.fetch)) else {
                continue;
            };
            if ins == upd {
                continue;
            }
            let ins_id = proj.cols()[ins].id;
            let upd_id = proj.cols()[upd].id;
            let col = self.tab.column(ord);
            let expr = ScalarExpr::Case {
                branches: vec![(
                    ScalarExpr::is_null(ScalarExpr::column(canary)),
                    ScalarExpr::column(ins_id),
                )],
                else_expr: Some(Box::new(ScalarExpr::column(upd_id))),
            };
            let alias = format!("upsert_{}", col.name);
            let scope_ord = proj.add(self.md, Some(&alias), expr, col.data_type.clone());
            let scope_col = proj.col_mut(scope_ord);
            scope_col.name = Some(col.name.clone());
            scope_col.table = Some(self.alias.clone());
            scope_col.mutation = col.is_mutation();
            self.roles.set(ord, Role::Upsert, scope_ord);
        }
        self.out_scope = proj.finish();
        // The new columns share their names with the values they merge.
        self.disambiguate_columns();
        Ok(())
    }
}
