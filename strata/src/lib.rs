//! Strata: relational plans for SQL writes.
//!
//! This crate is the entrypoint of the strata toolkit. It re-exports the mutation planner and
//! the types needed to describe tables, build statements and inspect the resulting plans.
//!
//! # Quick Start
//!
//! Register a table, then plan an UPDATE against it:
//!
//! ```rust
//! use std::sync::Arc;
//! use strata::catalog::{ColumnSchema, MemCatalog, TableSchema};
//! use strata::plan::{Assignment, Metadata, UpdateStatement, explain};
//! use strata::{DataType, MutationPlanner, parse_expr};
//!
//! let catalog = MemCatalog::new();
//! let table = TableSchema::new(
//!     "counters",
//!     vec![
//!         ColumnSchema::new("k", DataType::Int64),
//!         ColumnSchema::new("v", DataType::Int64),
//!     ],
//!     &["k"],
//! );
//! catalog.create_table(table, &[]).unwrap();
//!
//! let planner = MutationPlanner::new(Arc::new(catalog));
//! let mut md = Metadata::new();
//! let bump = Assignment::new("v", parse_expr("v + 1").unwrap());
//! let stmt = UpdateStatement::new("counters", vec![bump]);
//! let plan = planner.plan_update(&mut md, &stmt).unwrap();
//! assert!(explain(&plan.root, &md).starts_with("update counters"));
//! ```
//!
//! # Architecture
//!
//! - **Planning** (`strata-mutation`): builds INSERT, UPSERT, UPDATE and DELETE plans.
//! - **Plans** (`strata-plan`, `strata-expr`): relational and scalar expression trees.
//! - **Catalog** (`strata-catalog`): table schemas, constraints and privilege checks.
//! - **Expressions** (`strata-sql`): parses and types user expressions.

pub use strata_mutation::{EXCLUDED, MutationPlanner};
pub use strata_result::{Error, Result};
pub use strata_sql::parse_expr;

pub use arrow::datatypes::DataType;

pub mod catalog {
    //! Table schemas, constraints and the catalog traits the planner reads through.

    pub use strata_catalog::{
        AllowAll, Catalog, CheckConstraint, ColumnKind, ColumnSchema, DenyTables,
        ForeignKeyConstraint, ForeignKeySpec, IndexSchema, MatchMethod, MemCatalog,
        PrivilegeChecker, ReferenceAction, TableLookup, TableSchema, decimal_array,
    };
}

pub mod plan {
    //! Statement inputs, plan trees and the mutation node.

    pub use strata_plan::{
        Assignment, ColList, ConflictAction, DeleteStatement, FkCheckItem, FkDirection,
        InsertSource, InsertStatement, JoinKind, Metadata, MutationExpr, MutationPlan,
        MutationPrivate, MutationSettings, MutationStatement, OrderByItem, RelExpr,
        ReturningItem, Scope, ScopeColumn, TableRef, UpdateStatement, UpsertStatement,
        ValueOrDefault, ValuesClause, explain,
    };
    pub use strata_types::{ColumnId, StatementKind, TableId, WithId};
}

pub mod expr {
    //! Lowered scalar expressions and their values.

    pub use strata_expr::{BinaryOp, CompareOp, DecimalValue, Literal, ScalarExpr};
    pub use strata_sql::{ScalarResolver, SqlScalarResolver, TypedExpr};
}
