use strata_catalog::rounding_scale;
use strata_expr::ScalarExpr;
use strata_plan::Projection;
use strata_types::Role;

use crate::builder::MutationBuilder;

impl MutationBuilder<'_> {
    /// Round every `role` value headed for a bounded DECIMAL or DECIMAL[] column to the
    /// column's scale, replacing the value in place.
    ///
    /// `round_computed` selects computed columns only (true) or non-computed columns only
    /// (false). Values already rounded to the target scale are left alone. Only fractional
    /// digits are handled here; precision overflow is detected when the row is written.
    pub fn round_decimal_values(&mut self, role: Role, round_computed: bool) {
        let mut projection: Option<Projection> = None;
        for ord in 0..self.roles.len() {
            let Some(scope_ord) = self.roles.get(ord, role) else {
                continue;
            };
            let col = self.tab.column(ord);
            if col.is_computed() != round_computed {
                continue;
            }
            let Some(scale) = rounding_scale(&col.data_type) else {
                continue;
            };
            let current = match &projection {
                Some(proj) => &proj.cols()[scope_ord],
                None => self.out_scope.col(scope_ord),
            };
            if current.rounded_scale == Some(scale) {
                continue;
            }
            let (input, data_type) = (current.id, current.data_type.clone());

            let proj = projection.get_or_insert_with(|| self.take_scope().project());
            proj.replace(
                self.md,
                scope_ord,
                ScalarExpr::round_decimal(ScalarExpr::column(input), scale),
                data_type,
            );
            proj.col_mut(scope_ord).rounded_scale = Some(scale);
        }

        if let Some(proj) = projection {
            tracing::trace!(
                table = %self.tab.name,
                role = role.as_str(),
                round_computed,
                "rounded decimal values"
            );
            self.out_scope = proj.finish();
        }
    }
}
