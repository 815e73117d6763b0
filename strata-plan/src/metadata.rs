//! Per-statement registry of table references and plan columns.

use std::sync::Arc;

use arrow::datatypes::DataType;
use strata_catalog::TableSchema;
use strata_types::{ColumnId, TableId, TableOrdinal, WithId};

/// A column produced somewhere in the plan.
#[derive(Clone, Debug)]
pub struct ColumnMeta {
    pub id: ColumnId,
    pub alias: String,
    pub data_type: DataType,
    /// Table reference the column was read from, for scan columns.
    pub table: Option<TableId>,
}

/// One reference to a catalog table within the statement.
#[derive(Clone, Debug)]
pub struct TableMeta {
    pub id: TableId,
    pub schema: Arc<TableSchema>,
    pub alias: String,
    first_column: u32,
}

impl TableMeta {
    /// Column id bound to the table column at `ord` for this reference.
    #[inline]
    pub fn column_id(&self, ord: TableOrdinal) -> ColumnId {
        ColumnId(self.first_column + ord as u32)
    }

    /// Inverse of [`TableMeta::column_id`].
    pub fn column_ordinal(&self, id: ColumnId) -> Option<TableOrdinal> {
        let ord = id.0.checked_sub(self.first_column)? as usize;
        (ord < self.schema.deletable_column_count()).then_some(ord)
    }
}

/// Hands out statement-local ids and remembers what they denote.
///
/// Ids are never reused, so a `ColumnId` captured before a projection layer is appended still
/// denotes the same value afterwards.
#[derive(Debug, Default)]
pub struct Metadata {
    tables: Vec<TableMeta>,
    columns: Vec<ColumnMeta>,
    with_count: u32,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table reference. One column id is allocated per table column, including
    /// mutation-only columns, in schema order.
    pub fn add_table(&mut self, schema: Arc<TableSchema>, alias: impl Into<String>) -> TableId {
        let id = TableId(self.tables.len() as u32 + 1);
        let first_column = self.columns.len() as u32 + 1;
        for column in &schema.columns {
            let col_id = ColumnId(self.columns.len() as u32 + 1);
            self.columns.push(ColumnMeta {
                id: col_id,
                alias: column.name.clone(),
                data_type: column.data_type.clone(),
                table: Some(id),
            });
        }
        self.tables.push(TableMeta {
            id,
            schema,
            alias: alias.into(),
            first_column,
        });
        id
    }

    /// Allocate a column not read from any table.
    pub fn add_column(&mut self, alias: impl Into<String>, data_type: DataType) -> ColumnId {
        let id = ColumnId(self.columns.len() as u32 + 1);
        self.columns.push(ColumnMeta {
            id,
            alias: alias.into(),
            data_type,
            table: None,
        });
        id
    }

    /// Reserve an id for a buffered plan output.
    pub fn next_with_id(&mut self) -> WithId {
        self.with_count += 1;
        WithId(self.with_count)
    }

    #[inline]
    pub fn table(&self, id: TableId) -> &TableMeta {
        &self.tables[id.0 as usize - 1]
    }

    #[inline]
    pub fn column(&self, id: ColumnId) -> &ColumnMeta {
        &self.columns[id.0 as usize - 1]
    }

    pub fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the scan column `id` is declared NOT NULL in its table.
    pub fn is_not_null_table_column(&self, id: ColumnId) -> bool {
        let Some(table) = self.column(id).table else {
            return false;
        };
        let meta = self.table(table);
        meta.column_ordinal(id)
            .is_some_and(|ord| !meta.schema.column(ord).nullable)
    }
}
