use arrow::datatypes::DataType;
use rustc_hash::FxHashMap;
use strata_types::{StableId, TableOrdinal};

use crate::constraints::{CheckConstraint, ForeignKeyConstraint};

/// Visibility of a column to mutation statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColumnKind {
    /// Regular column, readable and writable.
    #[default]
    Ordinary,
    /// Column being added by a schema change. Writes must populate it, reads must not see it.
    WriteOnly,
    /// Column being dropped by a schema change. Only deletes still need to see it.
    DeleteOnly,
}

/// Definition of a single table column.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub hidden: bool,
    pub kind: ColumnKind,
    /// SQL text of the DEFAULT expression.
    pub default_expr: Option<String>,
    /// SQL text of the computed (generated) expression.
    pub computed_expr: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            hidden: false,
            kind: ColumnKind::Ordinary,
            default_expr: None,
            computed_expr: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_kind(mut self, kind: ColumnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default_expr = Some(expr.into());
        self
    }

    pub fn computed(mut self, expr: impl Into<String>) -> Self {
        self.computed_expr = Some(expr.into());
        self
    }

    #[inline]
    pub fn is_computed(&self) -> bool {
        self.computed_expr.is_some()
    }

    #[inline]
    pub fn has_default(&self) -> bool {
        self.default_expr.is_some()
    }

    /// True for write-only and delete-only columns.
    #[inline]
    pub fn is_mutation(&self) -> bool {
        self.kind != ColumnKind::Ordinary
    }
}

/// An index over a subset of the table's columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub key_columns: Vec<TableOrdinal>,
    pub unique: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, key_columns: Vec<TableOrdinal>, unique: bool) -> Self {
        Self {
            name: name.into(),
            key_columns,
            unique,
        }
    }
}

/// Full definition of a table as seen by the planner.
///
/// Columns are stored in schema order: ordinary columns first, followed by write-only and
/// then delete-only columns. This lets the ordinal ranges below be expressed as prefixes.
#[derive(Clone, Debug)]
pub struct TableSchema {
    pub id: StableId,
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_index: IndexSchema,
    pub secondary_indexes: Vec<IndexSchema>,
    pub checks: Vec<CheckConstraint>,
    /// Foreign keys where this table is the referencing side.
    pub outbound_fks: Vec<ForeignKeyConstraint>,
    /// Foreign keys of other tables (or this one) that reference this table.
    pub inbound_fks: Vec<ForeignKeyConstraint>,
    name_lookup: FxHashMap<String, TableOrdinal>,
    /// Key and index column names that matched no column, reported on registration.
    unknown_key_columns: Vec<String>,
}

impl TableSchema {
    /// Build a table, reordering columns so mutation-only columns come last.
    ///
    /// `primary_key` names the key columns; an empty slice keys the table on a hidden
    /// `rowid` column that is appended automatically. The id stays 0 until a catalog registers
    /// the table.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        primary_key: &[&str],
    ) -> Self {
        let mut columns = columns;
        if primary_key.is_empty() {
            columns.push(
                ColumnSchema::new("rowid", DataType::Int64)
                    .not_null()
                    .hidden()
                    .with_default("unique_rowid()"),
            );
        }
        columns.sort_by_key(|c| match c.kind {
            ColumnKind::Ordinary => 0,
            ColumnKind::WriteOnly => 1,
            ColumnKind::DeleteOnly => 2,
        });
        let name_lookup: FxHashMap<String, TableOrdinal> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_ascii_lowercase(), i))
            .collect();

        let key_names: Vec<&str> = if primary_key.is_empty() {
            vec!["rowid"]
        } else {
            primary_key.to_vec()
        };
        let mut unknown_key_columns = Vec::new();
        let mut key_columns = Vec::with_capacity(key_names.len());
        for n in key_names {
            match name_lookup.get(&n.to_ascii_lowercase()) {
                Some(&ord) => key_columns.push(ord),
                None => unknown_key_columns.push(n.to_string()),
            }
        }
        for &ord in &key_columns {
            columns[ord].nullable = false;
        }
        let table_name: String = name.into();

        Self {
            id: 0,
            primary_index: IndexSchema::new(format!("{table_name}_pkey"), key_columns, true),
            name: table_name,
            columns,
            secondary_indexes: Vec::new(),
            checks: Vec::new(),
            outbound_fks: Vec::new(),
            inbound_fks: Vec::new(),
            name_lookup,
            unknown_key_columns,
        }
    }

    pub fn with_check(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.checks.push(CheckConstraint::new(name, expr));
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        let mut key_columns = Vec::with_capacity(columns.len());
        for c in columns {
            match self.find_column(c) {
                Some(ord) => key_columns.push(ord),
                None => self.unknown_key_columns.push(c.to_string()),
            }
        }
        self.secondary_indexes
            .push(IndexSchema::new(name, key_columns, unique));
        self
    }

    /// Key or index column names that did not resolve to a column of this table.
    pub fn unknown_key_columns(&self) -> &[String] {
        &self.unknown_key_columns
    }

    /// Number of ordinary (public) columns.
    pub fn column_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Ordinary)
            .count()
    }

    /// Number of columns a write must populate: ordinary plus write-only.
    pub fn writable_column_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.kind != ColumnKind::DeleteOnly)
            .count()
    }

    /// Number of columns a delete must see: every column.
    #[inline]
    pub fn deletable_column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn column(&self, ord: TableOrdinal) -> &ColumnSchema {
        &self.columns[ord]
    }

    /// Case-insensitive lookup over every column, including mutation-only ones.
    pub fn find_column(&self, name: &str) -> Option<TableOrdinal> {
        self.name_lookup.get(&name.to_ascii_lowercase()).copied()
    }

    /// Primary index first, then secondary indexes.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexSchema> {
        std::iter::once(&self.primary_index).chain(self.secondary_indexes.iter())
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes().find(|idx| idx.name.eq_ignore_ascii_case(name))
    }

    /// True if `ordinals` (in any order) are exactly the key of the primary index or of a
    /// unique secondary index.
    pub fn is_unique_key(&self, ordinals: &[TableOrdinal]) -> bool {
        self.indexes().filter(|idx| idx.unique).any(|idx| {
            idx.key_columns.len() == ordinals.len()
                && ordinals.iter().all(|o| idx.key_columns.contains(o))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_columns_sort_last() {
        let t = TableSchema::new(
            "t",
            vec![
                ColumnSchema::new("a", DataType::Int64),
                ColumnSchema::new("gone", DataType::Int64).with_kind(ColumnKind::DeleteOnly),
                ColumnSchema::new("new", DataType::Int64).with_kind(ColumnKind::WriteOnly),
                ColumnSchema::new("b", DataType::Int64),
            ],
            &["a"],
        );
        let names: Vec<&str> = t.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "new", "gone"]);
        assert_eq!(t.column_count(), 2);
        assert_eq!(t.writable_column_count(), 3);
        assert_eq!(t.deletable_column_count(), 4);
        assert_eq!(t.primary_index.key_columns, vec![0]);
        assert!(!t.column(0).nullable);
    }

    #[test]
    fn missing_primary_key_adds_hidden_rowid() {
        let t = TableSchema::new("t", vec![ColumnSchema::new("a", DataType::Utf8)], &[]);
        let rowid = t.find_column("ROWID").unwrap();
        assert!(t.column(rowid).hidden);
        assert_eq!(t.primary_index.key_columns, vec![rowid]);
        assert!(t.is_unique_key(&[rowid]));
    }

    #[test]
    fn unknown_key_names_are_remembered() {
        let t = TableSchema::new(
            "t",
            vec![
                ColumnSchema::new("a", DataType::Int64),
                ColumnSchema::new("b", DataType::Int64),
            ],
            &["a", "nope"],
        )
        .with_index("t_b", &["b", "missing"], true);
        assert_eq!(t.primary_index.key_columns, vec![0]);
        assert_eq!(t.unknown_key_columns(), ["nope", "missing"]);
    }
}
