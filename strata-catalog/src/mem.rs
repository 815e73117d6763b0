//! Concurrent in-memory catalog.
//!
//! Tables are registered once with their foreign keys declared by name. Registration resolves
//! each key against the tables already present (or the table itself, for self references),
//! validates it, and records it both as an outbound key of the new table and as an inbound key
//! of the referenced table. Schemas are immutable once published; registering a referencing
//! table republishes the referenced table's `Arc` with the extra inbound key.

use std::sync::{Arc, RwLock};

use rustc_hash::{FxHashMap, FxHashSet};
use strata_result::{Error, Result};
use strata_types::{StableId, TableOrdinal};

use crate::constraints::{ForeignKeyConstraint, ForeignKeySpec};
use crate::provider::{Catalog, TableLookup};
use crate::schema::TableSchema;
use crate::types::{sql_type_name, types_equivalent};

/// In-memory [`Catalog`] with concurrent reads via `Arc<RwLock<_>>`.
#[derive(Debug, Clone, Default)]
pub struct MemCatalog {
    inner: Arc<RwLock<MemCatalogInner>>,
}

#[derive(Debug, Default)]
struct MemCatalogInner {
    /// Lowercase table name -> id
    by_name: FxHashMap<String, StableId>,
    tables: FxHashMap<StableId, TableEntry>,
    last_id: StableId,
}

#[derive(Debug, Clone)]
struct TableEntry {
    schema: Arc<TableSchema>,
    adding: bool,
}

impl MemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table`, assigning it the next catalog id and resolving `foreign_keys`.
    pub fn create_table(
        &self,
        mut table: TableSchema,
        foreign_keys: &[ForeignKeySpec],
    ) -> Result<Arc<TableSchema>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::CatalogError("failed to acquire catalog write lock".into()))?;

        let canonical = table.name.to_ascii_lowercase();
        if inner.by_name.contains_key(&canonical) {
            return Err(Error::CatalogError(format!(
                "relation \"{}\" already exists",
                table.name
            )));
        }

        if let Some(missing) = table.unknown_key_columns().first() {
            return Err(Error::CatalogError(format!(
                "column \"{missing}\" named in a key of \"{}\" does not exist",
                table.name
            )));
        }

        inner.last_id += 1;
        table.id = inner.last_id;

        let mut resolved = Vec::with_capacity(foreign_keys.len());
        for spec in foreign_keys {
            let fk = if spec.referenced_table.eq_ignore_ascii_case(&table.name) {
                resolve_foreign_key(&table, spec, &table)?
            } else {
                let parent_id = inner
                    .by_name
                    .get(&spec.referenced_table.to_ascii_lowercase())
                    .copied()
                    .ok_or_else(|| {
                        Error::CatalogError(format!(
                            "relation \"{}\" does not exist",
                            spec.referenced_table
                        ))
                    })?;
                let parent = Arc::clone(&inner.tables[&parent_id].schema);
                resolve_foreign_key(&table, spec, &parent)?
            };
            resolved.push(fk);
        }

        for fk in &resolved {
            if fk.referenced_table == table.id {
                table.inbound_fks.push(fk.clone());
            } else if let Some(entry) = inner.tables.get_mut(&fk.referenced_table) {
                let mut parent = (*entry.schema).clone();
                parent.inbound_fks.push(fk.clone());
                entry.schema = Arc::new(parent);
            }
        }
        table.outbound_fks = resolved;

        tracing::debug!(
            table = %table.name,
            id = table.id,
            outbound_fks = table.outbound_fks.len(),
            "registered table"
        );

        let schema = Arc::new(table);
        inner.by_name.insert(canonical, schema.id);
        inner.tables.insert(
            schema.id,
            TableEntry {
                schema: Arc::clone(&schema),
                adding: false,
            },
        );
        Ok(schema)
    }

    /// Mark a table as still being created (or finish creating it).
    ///
    /// While adding, the table resolves by id to [`TableLookup::Adding`] and is invisible by name.
    pub fn set_adding(&self, id: StableId, adding: bool) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::CatalogError("failed to acquire catalog write lock".into()))?;
        let entry = inner
            .tables
            .get_mut(&id)
            .ok_or_else(|| Error::CatalogError(format!("table id {id} does not exist")))?;
        entry.adding = adding;
        Ok(())
    }

    /// Current published schema of `name`, if registered and public.
    pub fn table(&self, name: &str) -> Option<Arc<TableSchema>> {
        self.resolve_table(name).ok()
    }
}

impl Catalog for MemCatalog {
    fn resolve_table(&self, name: &str) -> Result<Arc<TableSchema>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::CatalogError("failed to acquire catalog read lock".into()))?;
        inner
            .by_name
            .get(&name.to_ascii_lowercase())
            .and_then(|id| inner.tables.get(id))
            .filter(|entry| !entry.adding)
            .map(|entry| Arc::clone(&entry.schema))
            .ok_or_else(|| Error::CatalogError(format!("relation \"{name}\" does not exist")))
    }

    fn resolve_table_by_id(&self, id: StableId) -> Result<TableLookup> {
        let inner = self
            .inner
            .read()
            .map_err(|_| Error::CatalogError("failed to acquire catalog read lock".into()))?;
        match inner.tables.get(&id) {
            Some(entry) if entry.adding => Ok(TableLookup::Adding),
            Some(entry) => Ok(TableLookup::Found(Arc::clone(&entry.schema))),
            None => Err(Error::CatalogError(format!("table id {id} does not exist"))),
        }
    }
}

fn lookup_columns(
    table: &TableSchema,
    names: &[String],
    what: &str,
) -> Result<Vec<TableOrdinal>> {
    let mut seen = FxHashSet::default();
    let mut ordinals = Vec::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(Error::InvalidArgumentError(format!(
                "duplicate {what} column '{name}' in FOREIGN KEY constraint"
            )));
        }
        let ord = table.find_column(name).ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "unknown {what} column '{name}' in table '{}'",
                table.name
            ))
        })?;
        ordinals.push(ord);
    }
    Ok(ordinals)
}

fn resolve_foreign_key(
    child: &TableSchema,
    spec: &ForeignKeySpec,
    parent: &TableSchema,
) -> Result<ForeignKeyConstraint> {
    if spec.columns.is_empty() {
        return Err(Error::InvalidArgumentError(
            "FOREIGN KEY requires at least one referencing column".into(),
        ));
    }

    let origin_columns = lookup_columns(child, &spec.columns, "referencing")?;
    let referenced_columns = if spec.referenced_columns.is_empty() {
        parent.primary_index.key_columns.clone()
    } else {
        lookup_columns(parent, &spec.referenced_columns, "referenced")?
    };

    if origin_columns.len() != referenced_columns.len() {
        return Err(Error::InvalidArgumentError(format!(
            "number of referencing columns ({}) does not match number of referenced columns ({})",
            origin_columns.len(),
            referenced_columns.len()
        )));
    }

    if !parent.is_unique_key(&referenced_columns) {
        let names: Vec<&str> = referenced_columns
            .iter()
            .map(|&o| parent.column(o).name.as_str())
            .collect();
        return Err(Error::InvalidArgumentError(format!(
            "FOREIGN KEY references columns ({}) in table '{}' that do not form a UNIQUE or PRIMARY KEY constraint",
            names.join(", "),
            parent.name
        )));
    }

    for (&child_ord, &parent_ord) in origin_columns.iter().zip(referenced_columns.iter()) {
        let (child_col, parent_col) = (child.column(child_ord), parent.column(parent_ord));
        if !types_equivalent(&child_col.data_type, &parent_col.data_type) {
            return Err(Error::InvalidArgumentError(format!(
                "FOREIGN KEY column '{}' type {} does not match referenced column '{}' type {}",
                child_col.name,
                sql_type_name(&child_col.data_type),
                parent_col.name,
                sql_type_name(&parent_col.data_type)
            )));
        }
    }

    let name = spec.name.clone().unwrap_or_else(|| {
        format!(
            "fk_{}_ref_{}",
            spec.columns.join("_").to_ascii_lowercase(),
            parent.name.to_ascii_lowercase()
        )
    });

    Ok(ForeignKeyConstraint {
        name,
        origin_table: child.id,
        origin_columns,
        referenced_table: parent.id,
        referenced_columns,
        match_method: spec.match_method,
        on_delete: spec.on_delete,
        on_update: spec.on_update,
    })
}
