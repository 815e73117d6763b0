//! Per-statement bookkeeping of which scope column supplies each table column's value.

use rustc_hash::FxHashSet;
use strata_types::{ColumnId, Role, ScopeOrdinal, TableOrdinal};

/// Contributing values of one table column, one slot per role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub insert: Option<ScopeOrdinal>,
    pub fetch: Option<ScopeOrdinal>,
    pub update: Option<ScopeOrdinal>,
    pub upsert: Option<ScopeOrdinal>,
}

impl ColumnRoles {
    pub fn get(&self, role: Role) -> Option<ScopeOrdinal> {
        match role {
            Role::Insert => self.insert,
            Role::Fetch => self.fetch,
            Role::Update => self.update,
            Role::Upsert => self.upsert,
            Role::Check => None,
        }
    }

    fn slot(&mut self, role: Role) -> Option<&mut Option<ScopeOrdinal>> {
        match role {
            Role::Insert => Some(&mut self.insert),
            Role::Fetch => Some(&mut self.fetch),
            Role::Update => Some(&mut self.update),
            Role::Upsert => Some(&mut self.upsert),
            Role::Check => None,
        }
    }

    /// Scope ordinal of the column's final value: upsert, then update, then fetch, then insert.
    ///
    /// An upsert value already chooses between the update (or fetch) and insert values, and an
    /// update value supersedes the stale fetched one. Fetch and insert values only coexist in
    /// upserts, where an upsert value shadows both.
    pub fn resolve(&self) -> Option<ScopeOrdinal> {
        self.upsert.or(self.update).or(self.fetch).or(self.insert)
    }

    pub fn is_unset(&self) -> bool {
        self.resolve().is_none()
    }
}

/// Role slots for every table column plus one check slot per check constraint.
#[derive(Clone, Debug, Default)]
pub struct RoleMap {
    cols: Vec<ColumnRoles>,
    checks: Vec<Option<ScopeOrdinal>>,
}

impl RoleMap {
    pub fn new(column_count: usize, check_count: usize) -> Self {
        Self {
            cols: vec![ColumnRoles::default(); column_count],
            checks: vec![None; check_count],
        }
    }

    /// Number of table columns tracked.
    #[inline]
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    #[inline]
    pub fn column(&self, ord: TableOrdinal) -> &ColumnRoles {
        &self.cols[ord]
    }

    /// Value recorded for `ord` under `role`. For [`Role::Check`], `ord` is the check index.
    pub fn get(&self, ord: usize, role: Role) -> Option<ScopeOrdinal> {
        match role {
            Role::Check => self.checks.get(ord).copied().flatten(),
            _ => self.cols[ord].get(role),
        }
    }

    /// Record `scope_ord` as the `role` value of table column (or check) `ord`.
    pub fn set(&mut self, ord: usize, role: Role, scope_ord: ScopeOrdinal) {
        match role {
            Role::Check => self.checks[ord] = Some(scope_ord),
            _ => {
                if let Some(slot) = self.cols[ord].slot(role) {
                    *slot = Some(scope_ord);
                }
            }
        }
    }

    /// Forget the `role` value of `ord`.
    pub fn unset(&mut self, ord: usize, role: Role) {
        match role {
            Role::Check => self.checks[ord] = None,
            _ => {
                if let Some(slot) = self.cols[ord].slot(role) {
                    *slot = None;
                }
            }
        }
    }

    #[inline]
    pub fn resolve(&self, ord: TableOrdinal) -> Option<ScopeOrdinal> {
        self.cols[ord].resolve()
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }
}

/// Table columns explicitly assigned a value, in assignment order, without duplicates.
#[derive(Clone, Debug, Default)]
pub struct TargetColumns {
    list: Vec<ColumnId>,
    set: FxHashSet<ColumnId>,
}

impl TargetColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`. Returns false, leaving the list untouched, if it is already present.
    pub fn insert(&mut self, id: ColumnId) -> bool {
        if !self.set.insert(id) {
            return false;
        }
        self.list.push(id);
        true
    }

    #[inline]
    pub fn contains(&self, id: ColumnId) -> bool {
        self.set.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<ColumnId> {
        self.list.get(i).copied()
    }

    pub fn as_slice(&self) -> &[ColumnId] {
        &self.list
    }

    pub fn clear(&mut self) {
        self.list.clear();
        self.set.clear();
    }
}
