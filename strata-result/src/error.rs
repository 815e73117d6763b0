use std::fmt;
use thiserror::Error;

/// Unified error type for mutation planning.
///
/// Every variant aborts planning of the current statement. No partial plan is ever returned
/// alongside an error, and none of these errors are retried by the planner itself.
///
/// # Thread Safety
///
/// `Error` is `Send` and `Sync`, so independent statement builders running on different threads
/// can hand their failures back to a shared driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The same column was assigned more than once by the statement text.
    #[error("multiple assignments to the same column \"{column}\"")]
    DuplicateTarget { column: String },

    /// The column is a mutation-only column managed by the storage engine (for example one that
    /// is still being backfilled) and cannot be written by a statement.
    #[error("column \"{column}\" is being backfilled")]
    ProtectedColumn { column: String },

    /// The column is computed from other columns and cannot be assigned directly.
    #[error("cannot write directly to computed column \"{column}\"")]
    ComputedColumnWrite { column: String },

    /// Wrong number of value expressions for the number of target columns.
    ///
    /// Rendered as `INSERT has more expressions than target columns, 3 expressions for 2 targets`.
    #[error(
        "{op} has more {} than {}, {actual} expressions for {expected} targets",
        arity_sides(.actual, .expected).0,
        arity_sides(.actual, .expected).1
    )]
    Arity {
        op: String,
        actual: usize,
        expected: usize,
    },

    /// Rows of a VALUES clause do not all have the same width.
    #[error("VALUES lists must all be the same length, expected {expected} columns, found {found}")]
    ValuesLength { expected: usize, found: usize },

    /// A column name did not resolve to any visible column.
    #[error("column \"{0}\" does not exist")]
    UndefinedColumn(String),

    /// A column name resolved to more than one visible column.
    #[error("column reference \"{0}\" is ambiguous")]
    AmbiguousColumn(String),

    /// A supplied value does not fit the declared type of its column.
    #[error("value type {value_type} doesn't match type {column_type} of column \"{column}\"")]
    TypeMismatch {
        value_type: String,
        column_type: String,
        column: String,
    },

    /// A table alias appears more than once among the target table and FROM sources.
    #[error("source name \"{0}\" specified more than once (missing AS clause?)")]
    DuplicateTableAlias(String),

    /// An index hint named an index the table does not have.
    #[error("index \"{index}\" not found on table \"{table}\"")]
    UndefinedIndex { table: String, index: String },

    /// Expression text could not be parsed.
    ///
    /// Produced by the scalar expression resolver and propagated without alteration.
    #[error("at or near \"{near}\": syntax error: {message}")]
    Parse { near: String, message: String },

    /// The caller lacks a privilege on a table the plan needs to read.
    #[error("user {user} does not have {privilege} privilege on relation \"{relation}\"")]
    PermissionDenied {
        user: String,
        privilege: String,
        relation: String,
    },

    /// Catalog lookups failed (unknown table, malformed table definition).
    #[error("{0}")]
    CatalogError(String),

    /// Invalid user input that does not fit a more specific variant.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// A constraint was violated while the plan was executed.
    ///
    /// The planner itself never raises this; it is the error shape used by executors (and the
    /// in-memory evaluator in the test utilities) for failed checks and foreign keys.
    #[error("{0}")]
    ConstraintError(String),

    /// An internal invariant of the builder was violated.
    ///
    /// Indicates a bug rather than a user error. Tests assert it is unreachable for valid
    /// statements instead of asserting how it is handled.
    #[error("internal error: {0}")]
    AssertionFailure(String),
}

fn arity_sides(actual: &usize, expected: &usize) -> (&'static str, &'static str) {
    if actual > expected {
        ("expressions", "target columns")
    } else {
        ("target columns", "expressions")
    }
}

impl Error {
    /// Build an [`Error::AssertionFailure`] from anything printable.
    #[inline]
    pub fn assertion<E: fmt::Display>(msg: E) -> Self {
        Error::AssertionFailure(msg.to_string())
    }

    /// Build an [`Error::TypeMismatch`] for `column`.
    pub fn type_mismatch(
        value_type: impl Into<String>,
        column_type: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            value_type: value_type.into(),
            column_type: column_type.into(),
            column: column.into(),
        }
    }

    /// True for the internal invariant variant.
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, Error::AssertionFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_names_the_larger_side() {
        let more_exprs = Error::Arity {
            op: "INSERT".into(),
            actual: 3,
            expected: 2,
        };
        assert_eq!(
            more_exprs.to_string(),
            "INSERT has more expressions than target columns, 3 expressions for 2 targets"
        );

        let more_targets = Error::Arity {
            op: "UPSERT".into(),
            actual: 1,
            expected: 2,
        };
        assert_eq!(
            more_targets.to_string(),
            "UPSERT has more target columns than expressions, 1 expressions for 2 targets"
        );
    }

    #[test]
    fn type_mismatch_message() {
        let err = Error::type_mismatch("STRING", "INT8", "x");
        assert_eq!(
            err.to_string(),
            "value type STRING doesn't match type INT8 of column \"x\""
        );
    }
}
