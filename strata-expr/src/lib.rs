//! Scalar expressions as they appear in a built plan.
//!
//! User text is parsed and type-checked by the expression resolver; the result is lowered into
//! [`ScalarExpr`], which refers to plan columns by [`ColumnId`](strata_types::ColumnId) rather
//! than by name.

pub mod decimal;
pub mod expr;
pub mod format;
pub mod literal;

pub use decimal::{DecimalError, DecimalValue, MAX_DECIMAL_PRECISION};
pub use expr::{BinaryOp, CompareOp, ScalarExpr};
pub use literal::Literal;
