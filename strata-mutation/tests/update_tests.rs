use std::sync::Arc;

use arrow::datatypes::DataType;
use strata_catalog::{ColumnSchema, MemCatalog, TableSchema};
use strata_expr::Literal;
use strata_mutation::MutationPlanner;
use strata_plan::{
    Assignment, Metadata, MutationPlan, OrderByItem, ReturningItem, TableRef, UpdateStatement,
};
use strata_result::{Error, Result};
use strata_test_utils::fixtures::{catalog_with, defaults_table, sql, xyz_catalog, xyz_table};
use strata_test_utils::{Evaluator, TableStore, init_tracing_for_tests, mutation_input};
use strata_types::{ColumnId, StatementKind};

fn plan_stmt(
    catalog: Arc<MemCatalog>,
    stmt: &UpdateStatement,
) -> (Metadata, Result<MutationPlan>) {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(catalog);
    let mut md = Metadata::new();
    let plan = planner.plan_update(&mut md, stmt);
    (md, plan)
}

fn xyz_store(catalog: &MemCatalog) -> TableStore {
    let t = catalog.table("t").unwrap();
    let mut store = TableStore::new();
    store.insert(&t, [1, 10, 100]);
    store.insert(&t, [2, 20, 200]);
    store
}

#[test]
fn set_column_gets_update_role() {
    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("10"))])
        .with_filter(sql("x = 1"));
    let (_, plan) = plan_stmt(xyz_catalog(), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    assert_eq!(m.kind, StatementKind::Update);
    // The target table is registered first (@1..@3); the scan of it follows.
    assert_eq!(
        m.private.fetch_cols,
        vec![Some(ColumnId(4)), Some(ColumnId(5)), Some(ColumnId(6))]
    );
    assert_eq!(m.private.update_cols, vec![None, Some(ColumnId(7)), None]);
    assert!(m.private.insert_cols.iter().all(Option::is_none));
    assert!(m.private.upsert_cols.is_empty() || m.private.upsert_cols.iter().all(Option::is_none));
    assert!(plan.output.is_empty());
}

#[test]
fn update_reads_fetched_values() {
    let catalog = xyz_catalog();
    let store = xyz_store(&catalog);
    let stmt = UpdateStatement::new("t", vec![Assignment::new("z", sql("z + y"))])
        .with_filter(sql("x = 2"));
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    let rel = mutation_input(&plan, &md, &store).unwrap();
    assert_eq!(rel.len(), 1);
    let z = rel.column(m.private.update_cols[2].unwrap()).unwrap();
    assert_eq!(z, vec![Literal::Integer(220)]);
}

#[test]
fn returning_names_and_final_values() {
    let catalog = xyz_catalog();
    let store = xyz_store(&catalog);
    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("y + 1"))])
        .with_filter(sql("x = 1"))
        .with_returning(vec![
            ReturningItem::Star,
            ReturningItem::Expr {
                expr: sql("y * 2"),
                alias: Some("twice".into()),
            },
            ReturningItem::Expr {
                expr: sql("z - x"),
                alias: None,
            },
        ]);
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    let names: Vec<_> = plan
        .output
        .iter()
        .map(|c| c.name.clone().unwrap())
        .collect();
    assert_eq!(names, vec!["x", "y", "z", "twice", "?column?"]);
    assert_eq!(
        m.private.return_cols,
        Some(vec![
            m.private.fetch_cols[0],
            m.private.update_cols[1],
            m.private.fetch_cols[2]
        ])
    );

    let rel = Evaluator::new(&md, &store).eval(&plan.root).unwrap();
    assert_eq!(
        rel.rows,
        vec![vec![
            Literal::Integer(1),
            Literal::Integer(11),
            Literal::Integer(100),
            Literal::Integer(22),
            Literal::Integer(99),
        ]]
    );
}

fn with_rates() -> Arc<MemCatalog> {
    let rates = TableSchema::new(
        "rates",
        vec![
            ColumnSchema::new("k", DataType::Int64),
            ColumnSchema::new("w", DataType::Int64),
        ],
        &["k"],
    );
    catalog_with(vec![(xyz_table(), Vec::new()), (rates, Vec::new())])
}

#[test]
fn update_from_joins_and_returns_source_columns() {
    let catalog = with_rates();
    let mut store = xyz_store(&catalog);
    let rates = catalog.table("rates").unwrap();
    store.insert(&rates, [1, 7]);
    store.insert(&rates, [3, 9]);

    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("r.w"))])
        .with_from(vec![TableRef::new("rates").with_alias("r")])
        .with_filter(sql("t.x = r.k"))
        .with_returning(vec![
            ReturningItem::Expr {
                expr: sql("y"),
                alias: None,
            },
            ReturningItem::Expr {
                expr: sql("r.w"),
                alias: None,
            },
        ]);
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    assert_eq!(m.private.passthrough_cols.len(), 2);
    let names: Vec<_> = plan
        .output
        .iter()
        .map(|c| c.name.clone().unwrap())
        .collect();
    assert_eq!(names, vec!["y", "w"]);

    let rel = Evaluator::new(&md, &store).eval(&plan.root).unwrap();
    assert_eq!(rel.rows, vec![vec![Literal::Integer(7), Literal::Integer(7)]]);
}

#[test]
fn from_without_returning_passes_nothing_through() {
    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("w"))])
        .with_from(vec![TableRef::new("rates")])
        .with_filter(sql("x = k"));
    let (_, plan) = plan_stmt(with_rates(), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.private.passthrough_cols.is_empty());
    assert!(m.private.return_cols.is_none());
}

#[test]
fn repeated_alias_is_rejected() {
    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("1"))])
        .with_from(vec![TableRef::new("t")]);
    let (_, plan) = plan_stmt(xyz_catalog(), &stmt);
    assert_eq!(plan.unwrap_err(), Error::DuplicateTableAlias("t".into()));
}

#[test]
fn order_by_and_limit_bound_the_input() {
    let catalog = xyz_catalog();
    let store = xyz_store(&catalog);
    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("0"))])
        .with_order_by(vec![OrderByItem {
            expr: sql("x"),
            descending: true,
        }])
        .with_limit(sql("1"));
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    let rel = mutation_input(&plan, &md, &store).unwrap();
    let x = rel.column(m.private.fetch_cols[0].unwrap()).unwrap();
    assert_eq!(x, vec![Literal::Integer(2)]);
}

#[test]
fn computed_columns_follow_their_inputs() {
    let catalog = catalog_with(vec![(defaults_table(), Vec::new())]);
    let items = catalog.table("items").unwrap();
    let mut store = TableStore::new();
    store.insert(
        &items,
        [
            Literal::Integer(1),
            Literal::Integer(2),
            Literal::from("a"),
            Literal::Integer(4),
            Literal::Integer(0),
        ],
    );

    let stmt = UpdateStatement::new("items", vec![Assignment::new("qty", sql("qty + 3"))]);
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();

    assert!(m.private.update_cols[1].is_some());
    assert!(m.private.update_cols[2].is_none());
    assert!(m.private.update_cols[3].is_some());
    let rel = mutation_input(&plan, &md, &store).unwrap();
    let total = rel.column(m.private.update_cols[3].unwrap()).unwrap();
    assert_eq!(total, vec![Literal::Integer(10)]);
    let check = rel.column(m.private.check_cols[0].unwrap()).unwrap();
    assert_eq!(check, vec![Literal::Boolean(true)]);

    // Columns the computed expression does not read leave it alone.
    let stmt = UpdateStatement::new("items", vec![Assignment::new("label", sql("'b'"))]);
    let (_, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    assert!(plan.mutation().unwrap().private.update_cols[3].is_none());

    let stmt = UpdateStatement::new("items", vec![Assignment::default("qty")]);
    let (md, plan) = plan_stmt(catalog, &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    let rel = mutation_input(&plan, &md, &store).unwrap();
    assert_eq!(
        rel.column(m.private.update_cols[1].unwrap()).unwrap(),
        vec![Literal::Integer(1)]
    );
    assert_eq!(
        rel.column(m.private.update_cols[3].unwrap()).unwrap(),
        vec![Literal::Integer(2)]
    );
}

#[test]
fn failing_check_is_projected_as_false() {
    let catalog = catalog_with(vec![(defaults_table(), Vec::new())]);
    let items = catalog.table("items").unwrap();
    let mut store = TableStore::new();
    store.insert(&items, [1, 2]);

    let stmt = UpdateStatement::new("items", vec![Assignment::new("qty", sql("0"))]);
    let (md, plan) = plan_stmt(Arc::clone(&catalog), &stmt);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    let rel = mutation_input(&plan, &md, &store).unwrap();
    let check = rel.column(m.private.check_cols[0].unwrap()).unwrap();
    assert_eq!(check, vec![Literal::Boolean(false)]);
}

#[test]
fn assignment_errors() {
    let stmt = UpdateStatement::new("t", vec![Assignment::new("nope", sql("1"))]);
    let (_, plan) = plan_stmt(xyz_catalog(), &stmt);
    assert_eq!(plan.unwrap_err(), Error::UndefinedColumn("nope".into()));

    let stmt = UpdateStatement::new(
        "t",
        vec![
            Assignment::new("y", sql("1")),
            Assignment::new("y", sql("2")),
        ],
    );
    let (_, plan) = plan_stmt(xyz_catalog(), &stmt);
    assert_eq!(
        plan.unwrap_err(),
        Error::DuplicateTarget {
            column: "y".into()
        }
    );

    let stmt = UpdateStatement::new("t", vec![Assignment::new("y", sql("'a'"))]);
    let (_, plan) = plan_stmt(xyz_catalog(), &stmt);
    assert!(matches!(plan, Err(Error::TypeMismatch { .. })));

    let stmt = UpdateStatement::new("items", vec![Assignment::new("total", sql("1"))]);
    let (_, plan) = plan_stmt(catalog_with(vec![(defaults_table(), Vec::new())]), &stmt);
    assert_eq!(
        plan.unwrap_err(),
        Error::ComputedColumnWrite {
            column: "total".into()
        }
    );
}
