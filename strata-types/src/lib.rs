//! Identifiers and small enums shared across strata crates.
//!
//! These types live in `strata-types` so the catalog, the plan tree and the mutation builder can
//! agree on them without depending on each other.

pub mod ids;
pub mod role;

pub use ids::{ColumnId, ScopeOrdinal, StableId, TableId, TableOrdinal, WithId};
pub use role::{Role, StatementKind};
