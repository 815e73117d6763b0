//! Relational plans for INSERT, UPDATE, UPSERT and DELETE.
//!
//! [`MutationPlanner`] turns a statement into a [`strata_plan::MutationPlan`]: a plan of the
//! rows to write whose root is a mutation node. Along the way it fills in defaults and computed
//! columns, rounds decimals to their column scale, projects check constraint results and builds
//! the foreign key check queries the executor runs after the write.
//!
//! Planning is single-threaded per statement. A [`MutationBuilder`] owns all of a statement's
//! state and is dropped when the plan is returned, so independent statements can be planned
//! concurrently from one shared planner.

mod assemble;
mod builder;
mod check;
mod defaults;
mod delete;
mod fk;
mod input;
mod insert;
mod planner;
mod returning;
mod roles;
mod rounding;
mod update;
mod upsert;

pub use builder::MutationBuilder;
pub use input::InputClauses;
pub use planner::MutationPlanner;
pub use roles::{ColumnRoles, RoleMap, TargetColumns};
pub use upsert::EXCLUDED;
