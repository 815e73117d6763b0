use std::sync::Arc;

use rustc_hash::FxHashSet;
use strata_result::{Error, Result};
use strata_types::StableId;

use crate::schema::TableSchema;

/// Outcome of resolving a table by catalog id.
#[derive(Clone, Debug)]
pub enum TableLookup {
    Found(Arc<TableSchema>),
    /// The table exists but is still being created. Constraints that point at it are skipped.
    Adding,
}

/// Read-only access to table schemas.
///
/// Implementations must tolerate concurrent calls from independent statement builders.
pub trait Catalog: Send + Sync {
    /// Resolve a table by name. Unknown names are a [`Error::CatalogError`].
    fn resolve_table(&self, name: &str) -> Result<Arc<TableSchema>>;

    /// Resolve a table by catalog id, typically the other side of a foreign key.
    fn resolve_table_by_id(&self, id: StableId) -> Result<TableLookup>;
}

/// Confirms the caller may read tables the plan scans on its own behalf.
pub trait PrivilegeChecker: Send + Sync {
    fn check_select(&self, table: &TableSchema) -> Result<()>;
}

/// Grants everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PrivilegeChecker for AllowAll {
    fn check_select(&self, _table: &TableSchema) -> Result<()> {
        Ok(())
    }
}

/// Denies SELECT on a fixed set of tables for one user.
#[derive(Clone, Debug, Default)]
pub struct DenyTables {
    user: String,
    denied: FxHashSet<StableId>,
}

impl DenyTables {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            denied: FxHashSet::default(),
        }
    }

    pub fn deny(mut self, table: StableId) -> Self {
        self.denied.insert(table);
        self
    }
}

impl PrivilegeChecker for DenyTables {
    fn check_select(&self, table: &TableSchema) -> Result<()> {
        if self.denied.contains(&table.id) {
            return Err(Error::PermissionDenied {
                user: self.user.clone(),
                privilege: "SELECT".into(),
                relation: table.name.clone(),
            });
        }
        Ok(())
    }
}
