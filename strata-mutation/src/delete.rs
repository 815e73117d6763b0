use strata_plan::{DeleteStatement, Metadata, MutationPlan};
use strata_result::Result;
use strata_types::StatementKind;

use crate::builder::MutationBuilder;
use crate::input::InputClauses;
use crate::planner::MutationPlanner;

impl MutationPlanner {
    /// Plan a DELETE. Every column, mutation-only ones included, is fetched so the executor can
    /// remove the row from every index.
    pub fn plan_delete(&self, md: &mut Metadata, stmt: &DeleteStatement) -> Result<MutationPlan> {
        let mut mb = MutationBuilder::new(self, md, StatementKind::Delete, &stmt.table)?;
        mb.build_input(InputClauses {
            filter: stmt.filter.as_ref(),
            order_by: &stmt.order_by,
            limit: stmt.limit.as_ref(),
            ..InputClauses::default()
        })?;
        mb.build_fk_checks_for_delete()?;
        mb.finish(stmt.returning.as_deref())
    }
}
