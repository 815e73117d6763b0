//! Working column lists of a plan under construction.
//!
//! A [`Scope`] pairs a relational expression with the ordered columns it exposes to name
//! resolution. Adding a projection layer consumes the scope and yields a new one, so a
//! [`ScopeOrdinal`] read from an old scope cannot be applied to the new one by accident.

use arrow::datatypes::DataType;
use rustc_hash::FxHashSet;
use strata_expr::ScalarExpr;
use strata_result::{Error, Result};
use strata_types::{ColumnId, ScopeOrdinal};

use crate::metadata::Metadata;
use crate::rel::{JoinKind, ProjectionItem, RelExpr};

/// A column visible to expressions built over a scope.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeColumn {
    pub id: ColumnId,
    /// Name the column can be referenced by. `None` once cleared.
    pub name: Option<String>,
    /// Table alias qualifying the name.
    pub table: Option<String>,
    pub data_type: DataType,
    /// Excluded from `*` expansion but still resolvable by name.
    pub hidden: bool,
    /// Mutation-only table column. Never resolvable by name.
    pub mutation: bool,
    /// Resolvable only through its table qualifier (`excluded.x`, never bare `x`).
    pub qualified_only: bool,
    /// Scale this value was last rounded to.
    pub rounded_scale: Option<i8>,
}

impl ScopeColumn {
    pub fn new(id: ColumnId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: Some(name.into()),
            table: None,
            data_type,
            hidden: false,
            mutation: false,
            qualified_only: false,
            rounded_scale: None,
        }
    }

    pub fn anonymous(id: ColumnId, data_type: DataType) -> Self {
        Self {
            name: None,
            ..Self::new(id, "", data_type)
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_mutation(mut self, mutation: bool) -> Self {
        self.mutation = mutation;
        self
    }

    /// Require references to this column to carry `table` as qualifier.
    pub fn qualify_only(&mut self, table: impl Into<String>) {
        self.table = Some(table.into());
        self.qualified_only = true;
    }

    /// Make the column unreachable by name.
    pub fn clear_name(&mut self) {
        self.name = None;
        self.table = None;
        self.qualified_only = false;
    }

    /// Case-insensitive match against an optionally qualified name.
    pub fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        if self.mutation {
            return false;
        }
        let Some(own) = &self.name else {
            return false;
        };
        if !own.eq_ignore_ascii_case(name) {
            return false;
        }
        match (qualifier, &self.table) {
            (None, _) => !self.qualified_only,
            (Some(q), Some(t)) => q.eq_ignore_ascii_case(t),
            (Some(_), None) => false,
        }
    }

    /// Included in `*` expansion.
    pub fn is_visible(&self) -> bool {
        !self.hidden && !self.mutation && self.name.is_some()
    }
}

/// Find the column `qualifier.name` among `cols`.
///
/// Returns `Ok(None)` when nothing matches and [`Error::AmbiguousColumn`] when more than one
/// column matches.
pub fn find_column(
    cols: &[ScopeColumn],
    qualifier: Option<&str>,
    name: &str,
) -> Result<Option<ScopeOrdinal>> {
    let mut found = None;
    for (ord, col) in cols.iter().enumerate() {
        if col.matches(qualifier, name) {
            if found.is_some() {
                let full = match qualifier {
                    Some(q) => format!("{q}.{name}"),
                    None => name.to_string(),
                };
                return Err(Error::AmbiguousColumn(full));
            }
            found = Some(ord);
        }
    }
    Ok(found)
}

/// A relational expression together with the columns it exposes.
#[derive(Clone, Debug)]
pub struct Scope {
    expr: RelExpr,
    cols: Vec<ScopeColumn>,
}

impl Scope {
    pub fn new(expr: RelExpr, cols: Vec<ScopeColumn>) -> Self {
        Self { expr, cols }
    }

    /// A single row with no columns.
    pub fn unit() -> Self {
        Self::new(
            RelExpr::Values {
                cols: Vec::new(),
                rows: vec![Vec::new()],
            },
            Vec::new(),
        )
    }

    #[inline]
    pub fn expr(&self) -> &RelExpr {
        &self.expr
    }

    #[inline]
    pub fn cols(&self) -> &[ScopeColumn] {
        &self.cols
    }

    #[inline]
    pub fn col(&self, ord: ScopeOrdinal) -> &ScopeColumn {
        &self.cols[ord]
    }

    #[inline]
    pub fn col_mut(&mut self, ord: ScopeOrdinal) -> &mut ScopeColumn {
        &mut self.cols[ord]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    pub fn into_parts(self) -> (RelExpr, Vec<ScopeColumn>) {
        (self.expr, self.cols)
    }

    pub fn ordinal_of(&self, id: ColumnId) -> Option<ScopeOrdinal> {
        self.cols.iter().position(|c| c.id == id)
    }

    pub fn visible_cols(&self) -> impl Iterator<Item = &ScopeColumn> {
        self.cols.iter().filter(|c| !c.hidden)
    }

    /// Put a new operator on top of the expression without changing the columns.
    pub fn wrap(self, f: impl FnOnce(RelExpr) -> RelExpr) -> Scope {
        Scope {
            expr: f(self.expr),
            cols: self.cols,
        }
    }

    /// Join `right` onto this scope. Inner and left joins expose both column lists; semi and
    /// anti joins expose only the left side.
    pub fn join(self, kind: JoinKind, right: Scope, on: Vec<ScalarExpr>) -> Scope {
        let mut cols = self.cols;
        if matches!(kind, JoinKind::Inner | JoinKind::LeftOuter) {
            cols.extend(right.cols);
        }
        Scope {
            expr: RelExpr::Join {
                kind,
                left: Box::new(self.expr),
                right: Box::new(right.expr),
                on,
            },
            cols,
        }
    }

    /// Clear the names of every column whose ordinal is not in `preserve`.
    pub fn clear_names_except(&mut self, preserve: &FxHashSet<ScopeOrdinal>) {
        for (ord, col) in self.cols.iter_mut().enumerate() {
            if !preserve.contains(&ord) {
                col.clear_name();
            }
        }
    }

    /// Begin a projection layer over this scope.
    pub fn project(self) -> Projection {
        Projection {
            cols: self.cols.clone(),
            input_cols: self.cols,
            input: self.expr,
            items: Vec::new(),
        }
    }
}

/// A projection layer being assembled over an input scope.
///
/// Every input column passes through at its existing ordinal. New columns are appended after
/// them; replaced columns keep their ordinal and name but receive a fresh id.
#[derive(Debug)]
pub struct Projection {
    input: RelExpr,
    input_cols: Vec<ScopeColumn>,
    cols: Vec<ScopeColumn>,
    items: Vec<ProjectionItem>,
}

impl Projection {
    /// Columns of the input scope. Expressions of this layer resolve against these.
    pub fn input_cols(&self) -> &[ScopeColumn] {
        &self.input_cols
    }

    /// Output columns assembled so far.
    pub fn cols(&self) -> &[ScopeColumn] {
        &self.cols
    }

    pub fn col_mut(&mut self, ord: ScopeOrdinal) -> &mut ScopeColumn {
        &mut self.cols[ord]
    }

    /// Append a computed column and return its ordinal in the output.
    pub fn add(
        &mut self,
        md: &mut Metadata,
        name: Option<&str>,
        expr: ScalarExpr,
        data_type: DataType,
    ) -> ScopeOrdinal {
        let id = md.add_column(name.unwrap_or("column"), data_type.clone());
        self.items.push(ProjectionItem { id, expr });
        let col = match name {
            Some(name) => ScopeColumn::new(id, name, data_type),
            None => ScopeColumn::anonymous(id, data_type),
        };
        self.cols.push(col);
        self.cols.len() - 1
    }

    /// Replace the value at `ord` with `expr`, keeping the column's name and flags.
    pub fn replace(
        &mut self,
        md: &mut Metadata,
        ord: ScopeOrdinal,
        expr: ScalarExpr,
        data_type: DataType,
    ) -> ColumnId {
        let alias = self.cols[ord].name.clone().unwrap_or_else(|| "column".into());
        let id = md.add_column(alias, data_type.clone());
        self.items.push(ProjectionItem { id, expr });
        let col = &mut self.cols[ord];
        col.id = id;
        col.data_type = data_type;
        col.rounded_scale = None;
        id
    }

    /// True when nothing was added or replaced.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Close the layer. A layer with no projections returns the input unchanged.
    pub fn finish(self) -> Scope {
        if self.items.is_empty() {
            return Scope::new(self.input, self.cols);
        }
        let produced: FxHashSet<ColumnId> = self.items.iter().map(|item| item.id).collect();
        let passthrough = self
            .cols
            .iter()
            .map(|c| c.id)
            .filter(|id| !produced.contains(id))
            .collect();
        Scope::new(
            RelExpr::Project {
                input: Box::new(self.input),
                items: self.items,
                passthrough,
            },
            self.cols,
        )
    }
}

#[cfg(test)]
mod tests {
    use strata_expr::Literal;

    use super::*;

    fn base(md: &mut Metadata) -> Scope {
        let a = md.add_column("a", DataType::Int64);
        let b = md.add_column("b", DataType::Int64);
        Scope::new(
            RelExpr::Values {
                cols: vec![a, b],
                rows: vec![vec![ScalarExpr::literal(1), ScalarExpr::literal(2)]],
            },
            vec![
                ScopeColumn::new(a, "a", DataType::Int64).with_table("t"),
                ScopeColumn::new(b, "b", DataType::Int64).with_table("t"),
            ],
        )
    }

    #[test]
    fn projection_appends_and_replaces() {
        let mut md = Metadata::new();
        let scope = base(&mut md);
        let old_b = scope.col(1).id;

        let mut proj = scope.project();
        let c = proj.add(
            &mut md,
            Some("c"),
            ScalarExpr::Literal(Literal::Integer(3)),
            DataType::Int64,
        );
        let new_b = proj.replace(&mut md, 1, ScalarExpr::column(old_b), DataType::Int64);
        let scope = proj.finish();

        assert_eq!(c, 2);
        assert_eq!(scope.len(), 3);
        assert_eq!(scope.col(1).name.as_deref(), Some("b"));
        assert_ne!(new_b, old_b);
        match scope.expr() {
            RelExpr::Project {
                items, passthrough, ..
            } => {
                assert_eq!(items.len(), 2);
                assert_eq!(passthrough, &vec![scope.col(0).id]);
            }
            other => panic!("expected projection, got {other:?}"),
        }
    }

    #[test]
    fn empty_projection_adds_no_layer() {
        let mut md = Metadata::new();
        let scope = base(&mut md).project().finish();
        assert!(matches!(scope.expr(), RelExpr::Values { .. }));
    }

    #[test]
    fn name_resolution_respects_qualifiers_and_clearing() {
        let mut md = Metadata::new();
        let mut scope = base(&mut md);
        assert_eq!(find_column(scope.cols(), Some("T"), "A").unwrap(), Some(0));
        assert_eq!(find_column(scope.cols(), Some("u"), "a").unwrap(), None);

        let mut preserve = FxHashSet::default();
        preserve.insert(1);
        scope.clear_names_except(&preserve);
        assert_eq!(find_column(scope.cols(), None, "a").unwrap(), None);
        assert_eq!(find_column(scope.cols(), None, "b").unwrap(), Some(1));
    }

    #[test]
    fn qualified_only_columns_need_their_qualifier() {
        let mut col = ScopeColumn::new(ColumnId(1), "x", DataType::Int64).with_table("t");
        col.qualify_only("excluded");
        assert!(!col.matches(None, "x"));
        assert!(!col.matches(Some("t"), "x"));
        assert!(col.matches(Some("EXCLUDED"), "x"));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let mut md = Metadata::new();
        let scope = base(&mut md);
        let mut proj = scope.project();
        proj.add(&mut md, Some("a"), ScalarExpr::literal(9), DataType::Int64);
        let scope = proj.finish();
        let err = find_column(scope.cols(), None, "a").unwrap_err();
        assert!(matches!(err, Error::AmbiguousColumn(_)));
    }
}
