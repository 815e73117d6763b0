//! RETURNING: the final value of each table column and the projection over them.

use arrow::datatypes::DataType;
use strata_expr::ScalarExpr;
use strata_plan::{ColList, ProjectionItem, ReturningItem, ScopeColumn, SqlExpr};
use strata_result::{Error, Result};

use crate::builder::MutationBuilder;

/// Items of the RETURNING projection and the columns it produces.
pub(crate) struct ReturningProjection {
    pub items: Vec<ProjectionItem>,
    pub output: Vec<ScopeColumn>,
}

impl MutationBuilder<'_> {
    /// The final value of every public table column, in schema order. Mutation-only columns
    /// are never returned and stay unset.
    pub fn build_return_cols(&self) -> Result<ColList> {
        let public = self.tab.column_count();
        (0..self.tab.deletable_column_count())
            .map(|ord| {
                if ord >= public {
                    return Ok(None);
                }
                let scope_ord = self.resolve(ord).ok_or_else(|| {
                    Error::assertion(format!("column {ord} is not available in the mutation input"))
                })?;
                Ok(Some(self.scope_col_id(scope_ord)))
            })
            .collect()
    }

    /// Columns RETURNING may reference: the returned table columns under their table names,
    /// then any UPDATE ... FROM columns.
    fn returning_scope(&self, return_cols: &ColList) -> Vec<ScopeColumn> {
        let mut cols: Vec<ScopeColumn> = return_cols
            .iter()
            .enumerate()
            .filter_map(|(ord, id)| id.map(|id| self.table_scope_col(id, ord)))
            .collect();
        cols.extend(self.extra_accessible_cols.iter().cloned());
        cols
    }

    pub(crate) fn build_returning(
        &mut self,
        returning: &[ReturningItem],
        return_cols: &ColList,
    ) -> Result<ReturningProjection> {
        let in_cols = self.returning_scope(return_cols);
        let mut items = Vec::new();
        let mut output = Vec::new();
        for item in returning {
            match item {
                ReturningItem::Star => {
                    for col in in_cols.iter().filter(|c| c.is_visible()) {
                        let name = col.name.clone().unwrap_or_default();
                        self.push_returned(
                            &mut items,
                            &mut output,
                            &name,
                            ScalarExpr::column(col.id),
                            col.data_type.clone(),
                        );
                    }
                }
                ReturningItem::Expr { expr, alias } => {
                    let typed = self.planner.resolver.resolve(expr, &in_cols, None)?;
                    let name = alias.clone().unwrap_or_else(|| output_name(expr));
                    self.push_returned(&mut items, &mut output, &name, typed.expr, typed.data_type);
                }
            }
        }
        Ok(ReturningProjection { items, output })
    }

    fn push_returned(
        &mut self,
        items: &mut Vec<ProjectionItem>,
        output: &mut Vec<ScopeColumn>,
        name: &str,
        expr: ScalarExpr,
        data_type: DataType,
    ) {
        let id = self.md.add_column(name, data_type.clone());
        items.push(ProjectionItem { id, expr });
        output.push(ScopeColumn::new(id, name, data_type));
    }
}

/// Name of an unaliased RETURNING expression.
fn output_name(expr: &SqlExpr) -> String {
    match expr {
        SqlExpr::Identifier(ident) => ident.value.clone(),
        SqlExpr::CompoundIdentifier(parts) => parts
            .last()
            .map_or_else(|| "?column?".to_string(), |p| p.value.clone()),
        SqlExpr::Function(func) => func.name.to_string().to_ascii_lowercase(),
        _ => "?column?".to_string(),
    }
}
