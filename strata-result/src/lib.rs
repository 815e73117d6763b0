//! Error types and result definitions shared by every strata crate.
//!
//! All planning operations that can fail return [`Result<T>`], whose error variant is the
//! single [`Error`] enum defined here. Keeping one enum across crate boundaries lets errors
//! raised by collaborators (the expression resolver, the privilege checker, the catalog)
//! flow through the mutation builder with `?` and reach the caller unchanged.
//!
//! # Error Categories
//!
//! - **Target errors** ([`Error::DuplicateTarget`], [`Error::ProtectedColumn`],
//!   [`Error::ComputedColumnWrite`]): a statement tried to assign a column it may not assign.
//! - **Arity errors** ([`Error::Arity`], [`Error::ValuesLength`]): value and target counts
//!   disagree.
//! - **Column errors** ([`Error::UndefinedColumn`], [`Error::AmbiguousColumn`],
//!   [`Error::TypeMismatch`]): name resolution or type fit failed.
//! - **Collaborator errors** ([`Error::Parse`], [`Error::PermissionDenied`],
//!   [`Error::CatalogError`]): surfaced by external components and never rewrapped.
//! - **Execution-time errors** ([`Error::ConstraintError`]): check or foreign key violations
//!   reported by whatever runs the plan.
//! - **Internal errors** ([`Error::AssertionFailure`]): builder bugs; never reachable through a
//!   valid statement.

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
