//! Scalar expression resolution for the mutation planner.
//!
//! Expression text (stored defaults, computed columns, check constraints) is parsed with
//! `sqlparser`'s `GenericDialect`. Parsed expressions are then resolved against a scope's
//! columns, type-checked and lowered into [`ScalarExpr`](strata_expr::ScalarExpr).

pub mod functions;
pub mod parse;
pub mod resolver;

pub use parse::{column_refs, parse_expr};
pub use resolver::{ScalarResolver, SqlScalarResolver, TypedExpr};
