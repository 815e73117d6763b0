use strata_plan::{
    ColList, MutationExpr, MutationPlan, MutationPrivate, RelExpr, ReturningItem, explain,
};
use strata_result::Result;
use strata_types::Role;

use crate::builder::MutationBuilder;

impl MutationBuilder<'_> {
    /// Per-role column lists over every deletable table column.
    fn role_col_list(&self, role: Role) -> ColList {
        (0..self.roles.len())
            .map(|ord| self.roles.get(ord, role).map(|s| self.scope_col_id(s)))
            .collect()
    }

    fn make_mutation_private(&self, return_cols: Option<ColList>) -> MutationPrivate {
        let check_cols = (0..self.roles.check_count())
            .map(|i| self.roles.get(i, Role::Check).map(|s| self.scope_col_id(s)))
            .collect();
        let passthrough_cols = if return_cols.is_some() {
            self.extra_accessible_cols.iter().map(|c| c.id).collect()
        } else {
            Vec::new()
        };
        MutationPrivate {
            table: self.tab_id,
            insert_cols: self.role_col_list(Role::Insert),
            fetch_cols: self.role_col_list(Role::Fetch),
            update_cols: self.role_col_list(Role::Update),
            upsert_cols: self.role_col_list(Role::Upsert),
            canary_col: self.canary_col,
            check_cols,
            return_cols,
            passthrough_cols,
            fk_fallback: self.fk_fallback,
            with_id: if self.checks.is_empty() {
                None
            } else {
                self.with_id
            },
        }
    }

    /// Wrap the built input in the mutation node, then in the RETURNING projection if the
    /// statement has one.
    pub fn finish(mut self, returning: Option<&[ReturningItem]>) -> Result<MutationPlan> {
        let returning = returning.filter(|items| !items.is_empty());
        let return_cols = match returning {
            Some(_) => Some(self.build_return_cols()?),
            None => None,
        };
        let projection = match (returning, &return_cols) {
            (Some(items), Some(cols)) => Some(self.build_returning(items, cols)?),
            _ => None,
        };

        let private = self.make_mutation_private(return_cols);
        let checks = std::mem::take(&mut self.checks);
        let num_checks = checks.len();
        let (input, _) = self.take_scope().into_parts();
        let mut root = RelExpr::Mutation(Box::new(MutationExpr {
            kind: self.kind,
            input,
            private,
            checks,
        }));

        let mut output = Vec::new();
        if let Some(projection) = projection {
            root = RelExpr::Project {
                input: Box::new(root),
                items: projection.items,
                passthrough: Vec::new(),
            };
            output = projection.output;
        }

        tracing::debug!(
            table = %self.tab.name,
            kind = %self.kind,
            fk_checks = num_checks,
            fk_fallback = self.fk_fallback,
            returning = !output.is_empty(),
            "planned mutation"
        );
        tracing::trace!(plan = %explain(&root, self.md), "mutation plan");
        Ok(MutationPlan { root, output })
    }
}
