//! Plan representation for mutation statements.
//!
//! - [`Metadata`] hands out statement-local table and column ids.
//! - [`RelExpr`] is the relational plan tree; [`MutationExpr`] is its root for writes.
//! - [`Scope`] and [`Projection`] track which columns are visible while a plan is assembled.
//! - [`plans`] holds the statement inputs accepted by the planner.

pub mod format;
pub mod metadata;
pub mod mutation;
pub mod plans;
pub mod rel;
pub mod scope;
pub mod settings;

pub use format::explain;
pub use metadata::{ColumnMeta, Metadata, TableMeta};
pub use mutation::{ColList, FkCheckItem, FkDirection, MutationExpr, MutationPlan, MutationPrivate};
pub use plans::*;
pub use rel::{JoinKind, OrderingColumn, ProjectionItem, RelExpr, ScanExpr};
pub use scope::{Projection, Scope, ScopeColumn, find_column};
pub use settings::MutationSettings;

pub type PlanResult<T> = strata_result::Result<T>;
