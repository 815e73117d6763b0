use crate::error::Error;

/// Result alias used by every fallible strata operation.
pub type Result<T> = std::result::Result<T, Error>;
