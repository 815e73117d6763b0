//! Constraint descriptors attached to table schemas.

use strata_types::{StableId, TableOrdinal};

/// A boolean row check stored as SQL text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: String,
}

impl CheckConstraint {
    pub fn new(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
        }
    }
}

/// Null handling policy of a multi-column foreign key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MatchMethod {
    /// A row with any NULL key column is exempt.
    #[default]
    Simple,
    /// A row is exempt only when every key column is NULL.
    Full,
}

/// Referential action taken when a referenced key is deleted or updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReferenceAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferenceAction {
    /// True for actions that only reject the write, which a generated check can enforce.
    #[inline]
    pub const fn is_restrict_like(self) -> bool {
        matches!(self, ReferenceAction::NoAction | ReferenceAction::Restrict)
    }
}

/// A resolved foreign key between two catalog tables.
///
/// The same descriptor is listed as outbound on the origin table and as inbound on the
/// referenced table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeyConstraint {
    pub name: String,
    pub origin_table: StableId,
    pub origin_columns: Vec<TableOrdinal>,
    pub referenced_table: StableId,
    pub referenced_columns: Vec<TableOrdinal>,
    pub match_method: MatchMethod,
    pub on_delete: ReferenceAction,
    pub on_update: ReferenceAction,
}

impl ForeignKeyConstraint {
    #[inline]
    pub fn column_count(&self) -> usize {
        self.origin_columns.len()
    }
}

/// A foreign key as declared, by column name. Resolved into a [`ForeignKeyConstraint`] when
/// the owning table is registered with a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Empty means the referenced table's primary key.
    pub referenced_columns: Vec<String>,
    pub match_method: MatchMethod,
    pub on_delete: ReferenceAction,
    pub on_update: ReferenceAction,
}

impl ForeignKeySpec {
    pub fn new(columns: &[&str], referenced_table: &str, referenced_columns: &[&str]) -> Self {
        Self {
            name: None,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_table: referenced_table.to_string(),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
            match_method: MatchMethod::Simple,
            on_delete: ReferenceAction::NoAction,
            on_update: ReferenceAction::NoAction,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn match_full(mut self) -> Self {
        self.match_method = MatchMethod::Full;
        self
    }

    pub fn on_delete(mut self, action: ReferenceAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ReferenceAction) -> Self {
        self.on_update = action;
        self
    }
}
