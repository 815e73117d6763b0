use std::fmt;

/// Category of a column value within a mutation statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Value written by an insert, or by the insert half of an upsert.
    Insert,
    /// Existing value read from storage.
    Fetch,
    /// New value assigned by an update, or by the update half of an upsert.
    Update,
    /// Conditional choice between the insert and update values of an upsert.
    Upsert,
    /// Boolean result of a check constraint.
    Check,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Insert => "insert",
            Role::Fetch => "fetch",
            Role::Update => "update",
            Role::Upsert => "upsert",
            Role::Check => "check",
        }
    }
}

/// The kind of mutation statement being planned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl StatementKind {
    /// Lowercase operation name used in constraint violation messages.
    pub const fn op_name(self) -> &'static str {
        match self {
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Upsert => "upsert",
            StatementKind::Delete => "delete",
        }
    }

    /// Uppercase statement keyword used in arity errors.
    pub const fn keyword(self) -> &'static str {
        match self {
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Upsert => "UPSERT",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_name())
    }
}
