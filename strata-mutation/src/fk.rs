//! Foreign key check plans.
//!
//! Each check is a query over a buffered copy of the mutation input. If it returns any row when
//! run after the mutation, the statement violated the foreign key:
//!
//! - **Insertion checks** anti-join the new key values against the referenced table.
//! - **Deletion checks** semi-join the removed key values against the referencing table. For
//!   updates and upserts the removed values are the old values minus the new ones, so that
//!   rewriting a key to itself removes nothing.
//!
//! Foreign keys whose referential action is not RESTRICT or NO ACTION cannot be enforced by a
//! check query. Meeting one drops every check of the statement and sets the fallback flag,
//! leaving enforcement to the executor.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use strata_catalog::{ForeignKeyConstraint, MatchMethod, TableLookup, TableSchema};
use strata_expr::ScalarExpr;
use strata_plan::{FkCheckItem, FkDirection, JoinKind, RelExpr, ScanExpr};
use strata_result::{Error, Result};
use strata_types::{ColumnId, Role, StableId, TableId, TableOrdinal, WithId};

use crate::builder::MutationBuilder;

/// Which values of the mutated rows a check reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FkInputValues {
    /// Final values, after update or upsert.
    New,
    /// Values read from storage before the mutation.
    Fetched,
}

/// One foreign key, seen from the mutated table.
struct FkCheckHelper {
    fk: ForeignKeyConstraint,
    fk_ordinal: usize,
    other_tab: Arc<TableSchema>,
    /// Key columns in the mutated table, paired with `other_tab_ordinals`.
    tab_ordinals: Vec<TableOrdinal>,
    other_tab_ordinals: Vec<TableOrdinal>,
}

/// Output of [`MutationBuilder::make_fk_input_scan`].
struct FkInput {
    expr: RelExpr,
    cols: Vec<ColumnId>,
    not_null: FxHashSet<ColumnId>,
}

impl MutationBuilder<'_> {
    pub fn build_fk_checks_for_insert(&mut self) -> Result<()> {
        if self.tab.outbound_fks.is_empty() || !self.fk_checks_allowed() {
            return Ok(());
        }
        for i in 0..self.tab.outbound_fks.len() {
            self.add_insertion_check(i)?;
        }
        Ok(())
    }

    pub fn build_fk_checks_for_delete(&mut self) -> Result<()> {
        if self.tab.inbound_fks.is_empty() || !self.fk_checks_allowed() {
            return Ok(());
        }
        for i in 0..self.tab.inbound_fks.len() {
            let Some(helper) = self.inbound_fk_helper(i)? else {
                continue;
            };
            if !helper.fk.on_delete.is_restrict_like() {
                self.fall_back(&helper, "ON DELETE");
                return Ok(());
            }
            let input = self.make_fk_input_scan(&helper, FkInputValues::Fetched)?;
            self.add_deletion_check(&helper, input.expr, input.cols);
        }
        Ok(())
    }

    /// Insertion checks for outbound keys with an updated column, deletion checks for inbound
    /// keys with an updated column.
    pub fn build_fk_checks_for_update(&mut self) -> Result<()> {
        if self.tab.outbound_fks.is_empty() && self.tab.inbound_fks.is_empty() {
            return Ok(());
        }
        if !self.fk_checks_allowed() {
            return Ok(());
        }
        for i in 0..self.tab.outbound_fks.len() {
            if self.fk_cols_updated(&self.tab.outbound_fks[i].origin_columns) {
                self.add_insertion_check(i)?;
            }
        }
        self.add_update_deletion_checks()
    }

    /// Like UPDATE, except every outbound key is checked since any row may turn out to be an
    /// insert.
    pub fn build_fk_checks_for_upsert(&mut self) -> Result<()> {
        if self.tab.outbound_fks.is_empty() && self.tab.inbound_fks.is_empty() {
            return Ok(());
        }
        if !self.fk_checks_allowed() {
            return Ok(());
        }
        for i in 0..self.tab.outbound_fks.len() {
            self.add_insertion_check(i)?;
        }
        self.add_update_deletion_checks()
    }

    /// False, with the fallback flag set, when generated checks are turned off.
    fn fk_checks_allowed(&mut self) -> bool {
        if !self.fk_checks_enabled {
            tracing::debug!(table = %self.tab.name, "foreign key checks disabled, using fallback");
            self.fk_fallback = true;
        }
        self.fk_checks_enabled
    }

    fn fall_back(&mut self, helper: &FkCheckHelper, action: &str) {
        tracing::debug!(
            table = %self.tab.name,
            fk = %helper.fk.name,
            action,
            "non-restrict referential action, using fallback"
        );
        self.checks.clear();
        self.with_id = None;
        self.fk_fallback = true;
    }

    fn fk_cols_updated(&self, ordinals: &[TableOrdinal]) -> bool {
        ordinals
            .iter()
            .any(|&ord| self.roles.get(ord, Role::Update).is_some())
    }

    fn add_update_deletion_checks(&mut self) -> Result<()> {
        for i in 0..self.tab.inbound_fks.len() {
            if !self.fk_cols_updated(&self.tab.inbound_fks[i].referenced_columns) {
                continue;
            }
            let Some(helper) = self.inbound_fk_helper(i)? else {
                continue;
            };
            if !helper.fk.on_update.is_restrict_like() {
                self.fall_back(&helper, "ON UPDATE");
                return Ok(());
            }
            // Keys rewritten to a value some row still has are not removed. For upserts, the
            // fetched values of inserted rows are NULL and never match the semi-join.
            let old = self.make_fk_input_scan(&helper, FkInputValues::Fetched)?;
            let new = self.make_fk_input_scan(&helper, FkInputValues::New)?;
            let removed = RelExpr::Except {
                left: Box::new(old.expr),
                right: Box::new(new.expr),
                left_cols: old.cols.clone(),
                right_cols: new.cols,
                out_cols: old.cols.clone(),
            };
            self.add_deletion_check(&helper, removed, old.cols);
        }
        Ok(())
    }

    /// Resolve the other side of a foreign key. `None` when that table is still being added and
    /// the key is ignored.
    fn resolve_other_table(&self, id: StableId) -> Result<Option<Arc<TableSchema>>> {
        match self.planner.catalog.resolve_table_by_id(id)? {
            TableLookup::Adding => {
                tracing::debug!(table_id = id, "foreign key table is being added, skipping");
                Ok(None)
            }
            TableLookup::Found(schema) => {
                self.planner.privileges.check_select(&schema)?;
                Ok(Some(schema))
            }
        }
    }

    fn outbound_fk_helper(&self, fk_ordinal: usize) -> Result<Option<FkCheckHelper>> {
        let fk = self.tab.outbound_fks[fk_ordinal].clone();
        let Some(other_tab) = self.resolve_other_table(fk.referenced_table)? else {
            return Ok(None);
        };
        Ok(Some(FkCheckHelper {
            tab_ordinals: fk.origin_columns.clone(),
            other_tab_ordinals: fk.referenced_columns.clone(),
            fk,
            fk_ordinal,
            other_tab,
        }))
    }

    fn inbound_fk_helper(&self, fk_ordinal: usize) -> Result<Option<FkCheckHelper>> {
        let fk = self.tab.inbound_fks[fk_ordinal].clone();
        let Some(other_tab) = self.resolve_other_table(fk.origin_table)? else {
            return Ok(None);
        };
        Ok(Some(FkCheckHelper {
            tab_ordinals: fk.referenced_columns.clone(),
            other_tab_ordinals: fk.origin_columns.clone(),
            fk,
            fk_ordinal,
            other_tab,
        }))
    }

    /// Buffer id shared by every check of the statement, reserved on first use.
    fn ensure_with_id(&mut self) -> WithId {
        if let Some(id) = self.with_id {
            return id;
        }
        let id = self.md.next_with_id();
        tracing::trace!(table = %self.tab.name, with = %id, "buffering mutation input");
        self.with_id = Some(id);
        id
    }

    /// Re-read the key columns of the buffered mutation input under fresh column ids.
    ///
    /// A key column counts as not null if the input proves it, or if the table column is
    /// NOT NULL, since such a NULL fails the write before any check matters.
    fn make_fk_input_scan(
        &mut self,
        helper: &FkCheckHelper,
        values: FkInputValues,
    ) -> Result<FkInput> {
        let with = self.ensure_with_id();
        let input_not_null = match self.input_not_null.take() {
            Some(set) => set,
            None => self.out_scope.expr().not_null_cols(self.md),
        };

        let mut in_cols = Vec::with_capacity(helper.tab_ordinals.len());
        let mut out_cols = Vec::with_capacity(helper.tab_ordinals.len());
        let mut not_null = FxHashSet::default();
        for &tab_ord in &helper.tab_ordinals {
            let scope_ord = match values {
                FkInputValues::New => self.roles.resolve(tab_ord),
                FkInputValues::Fetched => self.roles.get(tab_ord, Role::Fetch),
            }
            .ok_or_else(|| {
                Error::assertion(format!("no value for FK column (table ordinal {tab_ord})"))
            })?;
            let in_col = self.scope_col_id(scope_ord);
            let meta = self.md.column(in_col);
            let (alias, data_type) = (meta.alias.clone(), meta.data_type.clone());
            let out_col = self.md.add_column(alias, data_type);
            if input_not_null.contains(&in_col) || !self.tab.column(tab_ord).nullable {
                not_null.insert(out_col);
            }
            in_cols.push(in_col);
            out_cols.push(out_col);
        }
        self.input_not_null = Some(input_not_null);

        Ok(FkInput {
            expr: RelExpr::WithScan {
                with,
                in_cols,
                out_cols: out_cols.clone(),
            },
            cols: out_cols,
            not_null,
        })
    }

    /// Scan the other table's key columns. The scan does not trigger checks of its own.
    fn build_other_table_scan(
        &mut self,
        helper: &FkCheckHelper,
    ) -> (TableId, RelExpr, Vec<ColumnId>) {
        let other_id = self
            .md
            .add_table(Arc::clone(&helper.other_tab), helper.other_tab.name.clone());
        let meta = self.md.table(other_id);
        let cols: Vec<ColumnId> = helper
            .other_tab_ordinals
            .iter()
            .map(|&ord| meta.column_id(ord))
            .collect();
        let scan = RelExpr::Scan(ScanExpr {
            table: other_id,
            cols: cols.clone(),
            index_hint: None,
            ignore_foreign_keys: true,
        });
        (other_id, scan, cols)
    }

    /// Check that every new key value of outbound key `fk_ordinal` exists in the referenced
    /// table.
    fn add_insertion_check(&mut self, fk_ordinal: usize) -> Result<()> {
        let Some(helper) = self.outbound_fk_helper(fk_ordinal)? else {
            return Ok(());
        };
        let FkInput {
            expr: mut input,
            cols,
            not_null,
        } = self.make_fk_input_scan(&helper, FkInputValues::New)?;

        if not_null.len() < cols.len() {
            // Rows exempt from the key never match the anti-join, so filter them out first.
            // MATCH SIMPLE exempts a row with any NULL key column. MATCH FULL exempts only an
            // all-NULL key; partially NULL keys stay and are reported.
            let filter = match helper.fk.match_method {
                MatchMethod::Simple => Some(ScalarExpr::all_of(
                    cols.iter()
                        .filter(|col| !not_null.contains(col))
                        .map(|&col| ScalarExpr::is_not_null(ScalarExpr::column(col)))
                        .collect(),
                )),
                MatchMethod::Full if not_null.is_empty() => Some(ScalarExpr::any_of(
                    cols.iter()
                        .map(|&col| ScalarExpr::is_not_null(ScalarExpr::column(col)))
                        .collect(),
                )),
                MatchMethod::Full => None,
            };
            if let Some(filter) = filter {
                input = RelExpr::Select {
                    input: Box::new(input),
                    filter,
                };
            }
        }

        let (referenced_table, scan, scan_cols) = self.build_other_table_scan(&helper);
        let on = cols
            .iter()
            .zip(&scan_cols)
            .map(|(&l, &r)| ScalarExpr::columns_eq(l, r))
            .collect();
        let check = RelExpr::Join {
            kind: JoinKind::Anti,
            left: Box::new(input),
            right: Box::new(scan),
            on,
        };

        tracing::trace!(table = %self.tab.name, fk = %helper.fk.name, "added insertion check");
        self.checks.push(FkCheckItem {
            origin_table: self.tab_id,
            referenced_table,
            direction: FkDirection::Outbound,
            fk_ordinal,
            key_cols: cols,
            op: self.kind,
            check,
        });
        Ok(())
    }

    /// Check that no row of the referencing table still holds a removed key value.
    ///
    /// NULL keys never reference anything, so no NULL filtering is needed here.
    fn add_deletion_check(
        &mut self,
        helper: &FkCheckHelper,
        removed: RelExpr,
        removed_cols: Vec<ColumnId>,
    ) {
        let (origin_table, scan, scan_cols) = self.build_other_table_scan(helper);
        let on = removed_cols
            .iter()
            .zip(&scan_cols)
            .map(|(&l, &r)| ScalarExpr::columns_eq(l, r))
            .collect();
        let check = RelExpr::Join {
            kind: JoinKind::Semi,
            left: Box::new(removed),
            right: Box::new(scan),
            on,
        };

        tracing::trace!(table = %self.tab.name, fk = %helper.fk.name, "added deletion check");
        self.checks.push(FkCheckItem {
            origin_table,
            referenced_table: self.tab_id,
            direction: FkDirection::Inbound,
            fk_ordinal: helper.fk_ordinal,
            key_cols: removed_cols,
            op: self.kind,
            check,
        });
    }
}
