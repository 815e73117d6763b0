use std::sync::Arc;

use strata_catalog::MemCatalog;
use strata_expr::{DecimalValue, Literal, ScalarExpr};
use strata_mutation::{MutationBuilder, MutationPlanner};
use strata_plan::{
    Assignment, InsertSource, Metadata, RelExpr, TableRef, UpdateStatement, ValueOrDefault,
    ValuesClause,
};
use strata_test_utils::fixtures::{catalog_with, decimal_table, sql};
use strata_test_utils::{TableStore, init_tracing_for_tests, mutation_input};
use strata_types::{Role, StatementKind};

fn prices_catalog() -> Arc<MemCatalog> {
    init_tracing_for_tests();
    catalog_with(vec![(decimal_table(), Vec::new())])
}

fn round_items(expr: &RelExpr) -> usize {
    match expr {
        RelExpr::Project { input, items, .. } => {
            items
                .iter()
                .filter(|item| matches!(item.expr, ScalarExpr::RoundDecimal { .. }))
                .count()
                + round_items(input)
        }
        _ => 0,
    }
}

#[test]
fn rounding_twice_adds_nothing() {
    let planner = MutationPlanner::new(prices_catalog());
    let mut md = Metadata::new();
    let mut mb = MutationBuilder::new(
        &planner,
        &mut md,
        StatementKind::Insert,
        &TableRef::new("prices"),
    )
    .unwrap();
    let source = InsertSource::Values(ValuesClause::new(vec![vec![
        ValueOrDefault::Expr(sql("1")),
        ValueOrDefault::Expr(sql("1.005")),
    ]]));
    mb.build_insert_input(&["id".to_string(), "amount".to_string()], &source)
        .unwrap();
    mb.add_default_and_computed_cols_for_insert().unwrap();

    // amount, history and doubled; raw is unbounded.
    assert_eq!(round_items(mb.scope().expr()), 3);
    let before = mb.scope().expr().clone();
    mb.round_decimal_values(Role::Insert, false);
    mb.round_decimal_values(Role::Insert, true);
    assert_eq!(mb.scope().expr(), &before);
}

#[test]
fn updated_decimals_round_to_column_scale() {
    let catalog = prices_catalog();
    let planner = MutationPlanner::new(catalog.clone());
    let prices = catalog.table("prices").unwrap();
    let mut store = TableStore::new();
    store.insert(
        &prices,
        [
            Literal::Integer(1),
            Literal::Decimal(DecimalValue::new(100, 2).unwrap()),
            Literal::Decimal(DecimalValue::new(20, 1).unwrap()),
        ],
    );

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new(
        "prices",
        vec![Assignment::new("amount", sql("amount * 0.333"))],
    );
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.private.update_cols[2].is_some());

    let rel = mutation_input(&plan, &md, &store).unwrap();
    assert_eq!(
        rel.column(m.private.update_cols[1].unwrap()).unwrap(),
        vec![Literal::Decimal(DecimalValue::new(33, 2).unwrap())]
    );
    assert_eq!(
        rel.column(m.private.update_cols[2].unwrap()).unwrap(),
        vec![Literal::Decimal(DecimalValue::new(7, 1).unwrap())]
    );
}
