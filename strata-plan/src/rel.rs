//! Relational plan tree.

use rustc_hash::FxHashSet;
use strata_expr::ScalarExpr;
use strata_types::{ColumnId, TableId, WithId};

use crate::metadata::Metadata;
use crate::mutation::MutationExpr;

/// A computed output column of a [`RelExpr::Project`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionItem {
    pub id: ColumnId,
    pub expr: ScalarExpr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    /// Left rows with at least one matching right row.
    Semi,
    /// Left rows with no matching right row.
    Anti,
}

impl JoinKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinKind::Inner => "inner-join",
            JoinKind::LeftOuter => "left-join",
            JoinKind::Semi => "semi-join",
            JoinKind::Anti => "anti-join",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderingColumn {
    pub column: ColumnId,
    pub descending: bool,
}

/// Read of a table reference registered in [`Metadata`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScanExpr {
    pub table: TableId,
    pub cols: Vec<ColumnId>,
    pub index_hint: Option<String>,
    /// Set on scans built for foreign key checks, which must not themselves trigger checks.
    pub ignore_foreign_keys: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RelExpr {
    Scan(ScanExpr),
    Values {
        cols: Vec<ColumnId>,
        rows: Vec<Vec<ScalarExpr>>,
    },
    /// Passthrough columns followed by computed items.
    Project {
        input: Box<RelExpr>,
        items: Vec<ProjectionItem>,
        passthrough: Vec<ColumnId>,
    },
    Select {
        input: Box<RelExpr>,
        filter: ScalarExpr,
    },
    Join {
        kind: JoinKind,
        left: Box<RelExpr>,
        right: Box<RelExpr>,
        on: Vec<ScalarExpr>,
    },
    /// Set difference by value. `out_cols[i]` carries `left_cols[i]`, matched against
    /// `right_cols[i]`; duplicates are removed and NULLs compare equal.
    Except {
        left: Box<RelExpr>,
        right: Box<RelExpr>,
        left_cols: Vec<ColumnId>,
        right_cols: Vec<ColumnId>,
        out_cols: Vec<ColumnId>,
    },
    /// Re-read of a buffered expression. `in_cols[i]` of the buffer is exposed as `out_cols[i]`.
    WithScan {
        with: WithId,
        in_cols: Vec<ColumnId>,
        out_cols: Vec<ColumnId>,
    },
    /// Keeps the first input row of each group, in input order. With `error_on_duplicate` set,
    /// a second row in any group is an error carrying that message instead. With
    /// `nulls_distinct`, a row with a NULL grouping value is a group of its own.
    DistinctOn {
        input: Box<RelExpr>,
        grouping: Vec<ColumnId>,
        error_on_duplicate: Option<String>,
        nulls_distinct: bool,
    },
    Sort {
        input: Box<RelExpr>,
        ordering: Vec<OrderingColumn>,
    },
    Limit {
        input: Box<RelExpr>,
        limit: ScalarExpr,
    },
    Mutation(Box<MutationExpr>),
}

impl RelExpr {
    /// Columns produced by this expression.
    pub fn output_cols(&self) -> Vec<ColumnId> {
        match self {
            RelExpr::Scan(scan) => scan.cols.clone(),
            RelExpr::Values { cols, .. } => cols.clone(),
            RelExpr::Project {
                items, passthrough, ..
            } => passthrough
                .iter()
                .copied()
                .chain(items.iter().map(|item| item.id))
                .collect(),
            RelExpr::Select { input, .. }
            | RelExpr::DistinctOn { input, .. }
            | RelExpr::Sort { input, .. }
            | RelExpr::Limit { input, .. } => input.output_cols(),
            RelExpr::Join {
                kind, left, right, ..
            } => {
                let mut cols = left.output_cols();
                if matches!(kind, JoinKind::Inner | JoinKind::LeftOuter) {
                    cols.extend(right.output_cols());
                }
                cols
            }
            RelExpr::Except { out_cols, .. } | RelExpr::WithScan { out_cols, .. } => {
                out_cols.clone()
            }
            RelExpr::Mutation(m) => m.output_cols(),
        }
    }

    /// Columns statically known never to be NULL in this expression's output.
    pub fn not_null_cols(&self, md: &Metadata) -> FxHashSet<ColumnId> {
        match self {
            RelExpr::Scan(scan) => scan
                .cols
                .iter()
                .copied()
                .filter(|&id| md.is_not_null_table_column(id))
                .collect(),
            RelExpr::Values { cols, rows } => cols
                .iter()
                .enumerate()
                .filter(|(i, _)| {
                    !rows.is_empty()
                        && rows.iter().all(|row| {
                            matches!(&row[*i], ScalarExpr::Literal(lit) if !lit.is_null())
                        })
                })
                .map(|(_, id)| *id)
                .collect(),
            RelExpr::Project {
                input,
                items,
                passthrough,
            } => {
                let input_nn = input.not_null_cols(md);
                let mut out: FxHashSet<ColumnId> = passthrough
                    .iter()
                    .copied()
                    .filter(|id| input_nn.contains(id))
                    .collect();
                out.extend(
                    items
                        .iter()
                        .filter(|item| scalar_not_null(&item.expr, &input_nn))
                        .map(|item| item.id),
                );
                out
            }
            RelExpr::Select { input, filter } => {
                let mut out = input.not_null_cols(md);
                null_rejected_cols(filter, &mut out);
                out
            }
            RelExpr::Join {
                kind,
                left,
                right,
                on,
            } => {
                let mut out = left.not_null_cols(md);
                if *kind == JoinKind::Inner {
                    out.extend(right.not_null_cols(md));
                    for cond in on {
                        null_rejected_cols(cond, &mut out);
                    }
                }
                out
            }
            RelExpr::Except {
                left,
                left_cols,
                out_cols,
                ..
            } => {
                let left_nn = left.not_null_cols(md);
                left_cols
                    .iter()
                    .zip(out_cols)
                    .filter(|(l, _)| left_nn.contains(l))
                    .map(|(_, o)| *o)
                    .collect()
            }
            RelExpr::DistinctOn { input, .. }
            | RelExpr::Sort { input, .. }
            | RelExpr::Limit { input, .. } => input.not_null_cols(md),
            RelExpr::WithScan { .. } | RelExpr::Mutation(_) => FxHashSet::default(),
        }
    }
}

/// Whether `expr` can be proven non-NULL given the non-NULL columns of its input.
fn scalar_not_null(expr: &ScalarExpr, input_nn: &FxHashSet<ColumnId>) -> bool {
    match expr {
        ScalarExpr::Literal(lit) => !lit.is_null(),
        ScalarExpr::Column(id) => input_nn.contains(id),
        ScalarExpr::IsNull { .. } => true,
        ScalarExpr::RoundDecimal { input, .. } => scalar_not_null(input, input_nn),
        ScalarExpr::Case {
            branches,
            else_expr,
        } => {
            branches.iter().all(|(_, v)| scalar_not_null(v, input_nn))
                && else_expr
                    .as_ref()
                    .is_some_and(|e| scalar_not_null(e, input_nn))
        }
        _ => false,
    }
}

/// Add the columns a filter conjunct rejects NULLs for.
fn null_rejected_cols(filter: &ScalarExpr, out: &mut FxHashSet<ColumnId>) {
    match filter {
        ScalarExpr::And(items) => {
            for item in items {
                null_rejected_cols(item, out);
            }
        }
        ScalarExpr::IsNull {
            expr,
            negated: true,
        } => {
            if let ScalarExpr::Column(id) = expr.as_ref() {
                out.insert(*id);
            }
        }
        ScalarExpr::Compare { left, right, .. } => {
            for side in [left, right] {
                if let ScalarExpr::Column(id) = side.as_ref() {
                    out.insert(*id);
                }
            }
        }
        _ => {}
    }
}
