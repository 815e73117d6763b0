//! The mutation plan node and the foreign key check items it carries.

use strata_catalog::ForeignKeyConstraint;
use strata_result::Error;
use strata_types::{ColumnId, StatementKind, TableId, WithId};

use crate::metadata::Metadata;
use crate::rel::RelExpr;
use crate::scope::ScopeColumn;

/// One entry per table column (or per check constraint); `None` when the role has no value for it.
pub type ColList = Vec<Option<ColumnId>>;

/// Which side of a foreign key the mutated table is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FkDirection {
    /// The mutated table holds the referencing columns.
    Outbound,
    /// The mutated table holds the referenced columns.
    Inbound,
}

/// A generated foreign key check. If `check` produces any row at execution time, the
/// statement violates the foreign key.
#[derive(Clone, Debug, PartialEq)]
pub struct FkCheckItem {
    pub origin_table: TableId,
    pub referenced_table: TableId,
    pub direction: FkDirection,
    /// Index into the mutated table's outbound list (outbound) or inbound list (inbound).
    pub fk_ordinal: usize,
    /// Columns of `check` holding the key values of a violating row.
    pub key_cols: Vec<ColumnId>,
    pub op: StatementKind,
    pub check: RelExpr,
}

impl FkCheckItem {
    /// Descriptor of the constraint this item checks.
    pub fn constraint<'a>(&self, md: &'a Metadata) -> Option<&'a ForeignKeyConstraint> {
        match self.direction {
            FkDirection::Outbound => md
                .table(self.origin_table)
                .schema
                .outbound_fks
                .get(self.fk_ordinal),
            FkDirection::Inbound => md
                .table(self.referenced_table)
                .schema
                .inbound_fks
                .get(self.fk_ordinal),
        }
    }

    /// Error reported when `check` is non-empty.
    pub fn violation(&self, md: &Metadata) -> Error {
        let origin = &md.table(self.origin_table).schema.name;
        let referenced = &md.table(self.referenced_table).schema.name;
        let name = self
            .constraint(md)
            .map_or("<unknown>", |fk| fk.name.as_str());
        let msg = match self.direction {
            FkDirection::Outbound => format!(
                "{} on table \"{origin}\" violates foreign key constraint \"{name}\" referencing table \"{referenced}\"",
                self.op
            ),
            FkDirection::Inbound => format!(
                "{} on table \"{referenced}\" violates foreign key constraint \"{name}\" on table \"{origin}\"",
                self.op
            ),
        };
        Error::ConstraintError(msg)
    }
}

/// Everything an executor needs to apply a mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct MutationPrivate {
    pub table: TableId,
    pub insert_cols: ColList,
    pub fetch_cols: ColList,
    pub update_cols: ColList,
    pub upsert_cols: ColList,
    /// Upsert only: NULL in this column means the row is inserted, otherwise updated.
    pub canary_col: Option<ColumnId>,
    /// One entry per check constraint.
    pub check_cols: ColList,
    /// Present when the statement returns rows; one entry per public table column.
    pub return_cols: Option<ColList>,
    /// Non-table columns passed through to RETURNING (update FROM columns).
    pub passthrough_cols: Vec<ColumnId>,
    /// Foreign keys must be enforced by the executor instead of by generated checks.
    pub fk_fallback: bool,
    /// Buffer id the FK checks read the mutation input from. Set only if checks exist.
    pub with_id: Option<WithId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MutationExpr {
    pub kind: StatementKind,
    pub input: RelExpr,
    pub private: MutationPrivate,
    pub checks: Vec<FkCheckItem>,
}

impl MutationExpr {
    pub fn output_cols(&self) -> Vec<ColumnId> {
        let mut cols: Vec<ColumnId> = self
            .private
            .return_cols
            .iter()
            .flatten()
            .flatten()
            .copied()
            .collect();
        if self.private.return_cols.is_some() {
            cols.extend(self.private.passthrough_cols.iter().copied());
        }
        cols
    }
}

/// A fully built mutation statement.
#[derive(Clone, Debug)]
pub struct MutationPlan {
    pub root: RelExpr,
    /// Result columns when the statement has RETURNING, otherwise empty.
    pub output: Vec<ScopeColumn>,
}

impl MutationPlan {
    /// The mutation node, beneath the RETURNING projection if there is one.
    pub fn mutation(&self) -> Option<&MutationExpr> {
        match &self.root {
            RelExpr::Mutation(m) => Some(m),
            RelExpr::Project { input, .. } => match input.as_ref() {
                RelExpr::Mutation(m) => Some(m),
                _ => None,
            },
            _ => None,
        }
    }
}
