use std::sync::Arc;

use strata_catalog::{AllowAll, Catalog, PrivilegeChecker};
use strata_plan::{Metadata, MutationPlan, MutationSettings, MutationStatement};
use strata_result::Result;
use strata_sql::{ScalarResolver, SqlScalarResolver};

/// Entry point for planning INSERT, UPSERT, UPDATE and DELETE statements.
///
/// A planner holds only shared, read-only collaborators, so one instance may plan statements
/// from several threads at once. Each call builds its plan in a fresh builder that owns all
/// per-statement state.
#[derive(Clone)]
pub struct MutationPlanner {
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) resolver: Arc<dyn ScalarResolver>,
    pub(crate) privileges: Arc<dyn PrivilegeChecker>,
    pub(crate) settings: MutationSettings,
}

impl MutationPlanner {
    /// Planner over `catalog` with the `sqlparser` resolver, no privilege restrictions and
    /// default settings.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            resolver: Arc::new(SqlScalarResolver),
            privileges: Arc::new(AllowAll),
            settings: MutationSettings::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ScalarResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_privileges(mut self, privileges: Arc<dyn PrivilegeChecker>) -> Self {
        self.privileges = privileges;
        self
    }

    pub fn with_settings(mut self, settings: MutationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> MutationSettings {
        self.settings
    }

    /// Plan any mutation statement.
    pub fn plan(&self, md: &mut Metadata, stmt: &MutationStatement) -> Result<MutationPlan> {
        match stmt {
            MutationStatement::Insert(insert) => self.plan_insert(md, insert),
            MutationStatement::Upsert(upsert) => self.plan_upsert(md, upsert),
            MutationStatement::Update(update) => self.plan_update(md, update),
            MutationStatement::Delete(delete) => self.plan_delete(md, delete),
        }
    }
}

impl std::fmt::Debug for MutationPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationPlanner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
