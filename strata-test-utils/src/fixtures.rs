//! Catalogs and statement pieces used across the scenario tests.
//!
//! Fixture construction panics on failure; a broken fixture is a bug in the test suite.

use std::sync::Arc;

use arrow::datatypes::DataType;
use sqlparser::ast::Expr as SqlExpr;
use strata_catalog::{
    ColumnKind, ColumnSchema, ForeignKeySpec, MemCatalog, TableSchema, decimal_array,
};

/// Parse expression text the way the planner receives user expressions.
pub fn sql(text: &str) -> SqlExpr {
    strata_sql::parse_expr(text).unwrap_or_else(|e| panic!("bad fixture expression {text:?}: {e}"))
}

/// Register `tables` in order, each with its foreign keys.
pub fn catalog_with(tables: Vec<(TableSchema, Vec<ForeignKeySpec>)>) -> Arc<MemCatalog> {
    let catalog = MemCatalog::new();
    for (table, fks) in tables {
        let name = table.name.clone();
        catalog
            .create_table(table, &fks)
            .unwrap_or_else(|e| panic!("failed to create fixture table {name}: {e}"));
    }
    Arc::new(catalog)
}

/// `t (x INT8 PRIMARY KEY, y INT8, z INT8)`
pub fn xyz_table() -> TableSchema {
    TableSchema::new(
        "t",
        vec![
            ColumnSchema::new("x", DataType::Int64),
            ColumnSchema::new("y", DataType::Int64),
            ColumnSchema::new("z", DataType::Int64),
        ],
        &["x"],
    )
}

/// A catalog holding only [`xyz_table`].
pub fn xyz_catalog() -> Arc<MemCatalog> {
    catalog_with(vec![(xyz_table(), Vec::new())])
}

/// `parent (p INT8 PRIMARY KEY, name STRING)`
pub fn parent_table() -> TableSchema {
    TableSchema::new(
        "parent",
        vec![
            ColumnSchema::new("p", DataType::Int64),
            ColumnSchema::new("name", DataType::Utf8),
        ],
        &["p"],
    )
}

/// `child (c INT8 PRIMARY KEY, p INT8, note STRING)`
pub fn child_table() -> TableSchema {
    TableSchema::new(
        "child",
        vec![
            ColumnSchema::new("c", DataType::Int64),
            ColumnSchema::new("p", DataType::Int64),
            ColumnSchema::new("note", DataType::Utf8),
        ],
        &["c"],
    )
}

/// `parent` and `child` with `child.p` referencing `parent.p` through a key named `fk`.
///
/// `fk` customizes the declared key (match method, referential actions).
pub fn parent_child_catalog(fk: impl FnOnce(ForeignKeySpec) -> ForeignKeySpec) -> Arc<MemCatalog> {
    let spec = fk(ForeignKeySpec::new(&["p"], "parent", &["p"]).named("fk"));
    catalog_with(vec![(parent_table(), Vec::new()), (child_table(), vec![spec])])
}

/// Two-column key: `pair (a, b) PRIMARY KEY` referenced by `item (id, a, b)`.
pub fn composite_fk_catalog(match_full: bool) -> Arc<MemCatalog> {
    let pair = TableSchema::new(
        "pair",
        vec![
            ColumnSchema::new("a", DataType::Int64),
            ColumnSchema::new("b", DataType::Int64),
        ],
        &["a", "b"],
    );
    let item = TableSchema::new(
        "item",
        vec![
            ColumnSchema::new("id", DataType::Int64),
            ColumnSchema::new("a", DataType::Int64),
            ColumnSchema::new("b", DataType::Int64),
        ],
        &["id"],
    );
    let mut spec = ForeignKeySpec::new(&["a", "b"], "pair", &["a", "b"]).named("item_pair_fk");
    if match_full {
        spec = spec.match_full();
    }
    catalog_with(vec![(pair, Vec::new()), (item, vec![spec])])
}

/// `prices` with a bounded decimal, a computed decimal, an unbounded decimal and a decimal
/// array.
pub fn decimal_table() -> TableSchema {
    TableSchema::new(
        "prices",
        vec![
            ColumnSchema::new("id", DataType::Int64),
            ColumnSchema::new("amount", DataType::Decimal128(10, 2)),
            ColumnSchema::new("doubled", DataType::Decimal128(10, 1)).computed("amount * 2"),
            ColumnSchema::new("raw", DataType::Decimal128(0, 0)),
            ColumnSchema::new("history", decimal_array(6, 1)),
        ],
        &["id"],
    )
}

/// `items` with defaults, a computed column, a check constraint and a write-only column being
/// backfilled.
pub fn defaults_table() -> TableSchema {
    TableSchema::new(
        "items",
        vec![
            ColumnSchema::new("id", DataType::Int64),
            ColumnSchema::new("qty", DataType::Int64).with_default("1"),
            ColumnSchema::new("label", DataType::Utf8).with_default("'none'"),
            ColumnSchema::new("total", DataType::Int64).computed("qty * 2"),
            ColumnSchema::new("added", DataType::Int64)
                .with_kind(ColumnKind::WriteOnly)
                .with_default("0"),
        ],
        &["id"],
    )
    .with_check("qty_positive", "qty > 0")
}

/// `keyless (v INT8)`, keyed by its hidden `rowid` column.
pub fn keyless_table() -> TableSchema {
    TableSchema::new("keyless", vec![ColumnSchema::new("v", DataType::Int64)], &[])
}
