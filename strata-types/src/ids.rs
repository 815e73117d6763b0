//! Identifier newtypes.
//!
//! Two identifier spaces exist side by side:
//!
//! - **Catalog ids** ([`StableId`]) survive across statements. They name a table in the catalog
//!   and are what foreign key descriptors refer to.
//! - **Statement ids** ([`TableId`], [`ColumnId`], [`WithId`]) are handed out by the per-statement
//!   metadata while a plan is built. They are never reused within a statement and have no
//!   meaning outside of it.

use std::fmt;

/// Catalog identifier of a table, stable across statements.
pub type StableId = u32;

/// Position of a column within a table's schema, counting hidden and mutation-only columns.
pub type TableOrdinal = usize;

/// Position of a column within the current working column list of a plan under construction.
///
/// Scope ordinals are only meaningful against the scope they were read from.
pub type ScopeOrdinal = usize;

/// Statement-local identifier of one table reference.
///
/// The same catalog table referenced twice (for example the target table and a scan of it in an
/// upsert) receives two distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

/// Statement-local identifier of a single column of the plan.
///
/// Each id is bound to exactly one produced value and is immutable once assigned. Ids start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub u32);

/// Identifier of a buffered (materialized) plan output that other subtrees may re-read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WithId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl fmt::Display for WithId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.0)
    }
}
