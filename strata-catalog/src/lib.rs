//! Table metadata consumed by the mutation planner.
//!
//! The planner never owns schemas. It asks a [`Catalog`] for them, holds the returned
//! `Arc<TableSchema>` for the duration of one statement, and reads constraint descriptors
//! straight off the schema. [`MemCatalog`] is a concurrent in-memory implementation used by the
//! test suites and by embedders that keep their schemas in memory.

#![forbid(unsafe_code)]

pub mod constraints;
pub mod mem;
pub mod provider;
pub mod schema;
pub mod types;

pub use constraints::{
    CheckConstraint, ForeignKeyConstraint, ForeignKeySpec, MatchMethod, ReferenceAction,
};
pub use mem::MemCatalog;
pub use provider::{AllowAll, Catalog, DenyTables, PrivilegeChecker, TableLookup};
pub use schema::{ColumnKind, ColumnSchema, IndexSchema, TableSchema};
pub use types::{UNBOUNDED_DECIMAL, decimal_array, rounding_scale, sql_type_name, types_equivalent};
