use std::sync::Arc;

use arrow::datatypes::DataType;
use strata_catalog::{
    ColumnSchema, DenyTables, ForeignKeySpec, MemCatalog, ReferenceAction, TableSchema,
};
use strata_expr::Literal;
use strata_mutation::MutationPlanner;
use strata_plan::{
    Assignment, DeleteStatement, FkDirection, InsertSource, InsertStatement, JoinKind, Metadata,
    MutationPlan, MutationSettings, RelExpr, UpdateStatement, UpsertStatement, ValueOrDefault,
    ValuesClause,
};
use strata_result::{Error, Result};
use strata_test_utils::fixtures::{catalog_with, composite_fk_catalog, parent_child_catalog, sql};
use strata_test_utils::{TableStore, init_tracing_for_tests, run_fk_checks};

fn values(rows: &[&[&str]]) -> InsertSource {
    InsertSource::Values(ValuesClause::new(
        rows.iter()
            .map(|row| row.iter().map(|v| ValueOrDefault::Expr(sql(v))).collect())
            .collect(),
    ))
}

fn family() -> (Arc<MemCatalog>, TableStore) {
    let catalog = parent_child_catalog(|fk| fk);
    let parent = catalog.table("parent").unwrap();
    let child = catalog.table("child").unwrap();
    let mut store = TableStore::new();
    store.insert(&parent, [Literal::Integer(1), Literal::from("one")]);
    store.insert(&parent, [Literal::Integer(2), Literal::from("two")]);
    store.insert(
        &child,
        [Literal::Integer(10), Literal::Integer(1), Literal::from("n")],
    );
    (catalog, store)
}

fn planner(catalog: &Arc<MemCatalog>) -> MutationPlanner {
    init_tracing_for_tests();
    MutationPlanner::new(catalog.clone())
}

fn insert_child(planner: &MutationPlanner, rows: &[&[&str]]) -> (Metadata, Result<MutationPlan>) {
    let mut md = Metadata::new();
    let stmt = InsertStatement::new("child", values(rows));
    let plan = planner.plan_insert(&mut md, &stmt);
    (md, plan)
}

fn constraint_error(msg: &str) -> Error {
    Error::ConstraintError(msg.into())
}

#[test]
fn insert_checks_new_references() {
    let (catalog, store) = family();
    let planner = planner(&catalog);

    let (md, plan) = insert_child(&planner, &[&["11", "2", "'ok'"]]);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    assert_eq!(m.checks.len(), 1);
    let item = &m.checks[0];
    assert_eq!(item.direction, FkDirection::Outbound);
    assert_eq!(item.key_cols.len(), 1);
    assert!(matches!(
        item.check,
        RelExpr::Join {
            kind: JoinKind::Anti,
            ..
        }
    ));
    assert_eq!(item.constraint(&md).unwrap().name, "fk");
    run_fk_checks(&plan, &md, &store).unwrap();

    let (md, plan) = insert_child(&planner, &[&["11", "2", "'ok'"], &["12", "9", "'bad'"]]);
    assert_eq!(
        run_fk_checks(&plan.unwrap(), &md, &store).unwrap_err(),
        constraint_error(
            "insert on table \"child\" violates foreign key constraint \"fk\" referencing table \
             \"parent\""
        )
    );
}

#[test]
fn null_references_are_exempt() {
    let (catalog, store) = family();
    let planner = planner(&catalog);
    let (md, plan) = insert_child(&planner, &[&["11", "NULL", "'orphan'"]]);
    run_fk_checks(&plan.unwrap(), &md, &store).unwrap();
}

fn pair_store(catalog: &MemCatalog) -> TableStore {
    let pair = catalog.table("pair").unwrap();
    let mut store = TableStore::new();
    store.insert(&pair, [1, 1]);
    store
}

fn insert_item(catalog: &Arc<MemCatalog>, row: &[&str]) -> Result<()> {
    let planner = planner(catalog);
    let mut md = Metadata::new();
    let plan = planner.plan_insert(&mut md, &InsertStatement::new("item", values(&[row])))?;
    run_fk_checks(&plan, &md, &pair_store(catalog))
}

#[test]
fn match_simple_exempts_any_null() {
    let catalog = composite_fk_catalog(false);
    insert_item(&catalog, &["1", "1", "1"]).unwrap();
    insert_item(&catalog, &["2", "5", "NULL"]).unwrap();
    insert_item(&catalog, &["3", "NULL", "NULL"]).unwrap();
    assert!(matches!(
        insert_item(&catalog, &["4", "5", "5"]),
        Err(Error::ConstraintError(_))
    ));
}

#[test]
fn match_full_exempts_only_all_null() {
    let catalog = composite_fk_catalog(true);
    insert_item(&catalog, &["1", "1", "1"]).unwrap();
    insert_item(&catalog, &["3", "NULL", "NULL"]).unwrap();
    assert_eq!(
        insert_item(&catalog, &["2", "5", "NULL"]).unwrap_err(),
        constraint_error(
            "insert on table \"item\" violates foreign key constraint \"item_pair_fk\" \
             referencing table \"pair\""
        )
    );
    assert!(matches!(
        insert_item(&catalog, &["4", "1", "NULL"]),
        Err(Error::ConstraintError(_))
    ));
}

#[test]
fn update_checks_only_changed_keys() {
    let (catalog, store) = family();
    let planner = planner(&catalog);

    // Not touching the key needs no check at all.
    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("child", vec![Assignment::new("note", sql("'x'"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.with_id.is_none());

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("child", vec![Assignment::new("p", sql("9"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    assert_eq!(
        run_fk_checks(&plan, &md, &store).unwrap_err(),
        constraint_error(
            "update on table \"child\" violates foreign key constraint \"fk\" referencing table \
             \"parent\""
        )
    );
}

#[test]
fn rewriting_a_referenced_key_to_itself_is_allowed() {
    let (catalog, store) = family();
    let planner = planner(&catalog);

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("parent", vec![Assignment::new("p", sql("p"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert_eq!(m.checks.len(), 1);
    let RelExpr::Join { left, .. } = &m.checks[0].check else {
        panic!("deletion check is not a join");
    };
    assert!(matches!(left.as_ref(), RelExpr::Except { .. }));
    run_fk_checks(&plan, &md, &store).unwrap();

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("parent", vec![Assignment::new("p", sql("p + 100"))])
        .with_filter(sql("p = 1"));
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    assert_eq!(
        run_fk_checks(&plan, &md, &store).unwrap_err(),
        constraint_error(
            "update on table \"parent\" violates foreign key constraint \"fk\" on table \"child\""
        )
    );

    // The key of parent 2 is not referenced, so it may change.
    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("parent", vec![Assignment::new("p", sql("p + 100"))])
        .with_filter(sql("p = 2"));
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    run_fk_checks(&plan, &md, &store).unwrap();
}

#[test]
fn upsert_checks_every_outbound_key() {
    let (catalog, store) = family();
    let planner = planner(&catalog);

    let mut md = Metadata::new();
    let stmt = UpsertStatement::new("child", values(&[&["10", "9", "'moved'"]]));
    let plan = planner.plan_upsert(&mut md, &stmt).unwrap();
    assert_eq!(
        run_fk_checks(&plan, &md, &store).unwrap_err(),
        constraint_error(
            "upsert on table \"child\" violates foreign key constraint \"fk\" referencing table \
             \"parent\""
        )
    );

    let mut md = Metadata::new();
    let stmt = UpsertStatement::new("child", values(&[&["10", "2", "'moved'"]]));
    let plan = planner.plan_upsert(&mut md, &stmt).unwrap();
    run_fk_checks(&plan, &md, &store).unwrap();
}

#[test]
fn upsert_into_referenced_table_keeps_existing_keys() {
    let (catalog, store) = family();
    let planner = planner(&catalog);

    let mut md = Metadata::new();
    let stmt = UpsertStatement::new("parent", values(&[&["1", "'uno'"], &["3", "'tres'"]]));
    let plan = planner.plan_upsert(&mut md, &stmt).unwrap();
    run_fk_checks(&plan, &md, &store).unwrap();
}

#[test]
fn upsert_changing_a_referenced_key_is_checked() {
    let (catalog, store) = family();
    let planner = planner(&catalog);
    let upsert = |row: &[&str]| {
        UpsertStatement::new("parent", values(&[row]))
            .on_conflict(&["p"], vec![Assignment::new("p", sql("p + 100"))])
    };

    let mut md = Metadata::new();
    let plan = planner.plan_upsert(&mut md, &upsert(&["1", "'uno'"])).unwrap();
    let m = plan.mutation().unwrap();
    assert_eq!(m.checks.len(), 1);
    assert_eq!(m.checks[0].direction, FkDirection::Inbound);
    let RelExpr::Join { left, .. } = &m.checks[0].check else {
        panic!("deletion check is not a join");
    };
    assert!(matches!(left.as_ref(), RelExpr::Except { .. }));
    assert_eq!(
        run_fk_checks(&plan, &md, &store).unwrap_err(),
        constraint_error(
            "upsert on table \"parent\" violates foreign key constraint \"fk\" on table \"child\""
        )
    );

    // Parent 2 has no children, and parent 3 is a plain insert.
    for row in [["2", "'dos'"], ["3", "'tres'"]] {
        let mut md = Metadata::new();
        let plan = planner.plan_upsert(&mut md, &upsert(&row)).unwrap();
        run_fk_checks(&plan, &md, &store).unwrap();
    }
}

/// `emp (id PRIMARY KEY, manager REFERENCES emp (id) ON UPDATE CASCADE)`.
fn cascading_emp_catalog() -> Arc<MemCatalog> {
    let emp = TableSchema::new(
        "emp",
        vec![
            ColumnSchema::new("id", DataType::Int64),
            ColumnSchema::new("manager", DataType::Int64),
        ],
        &["id"],
    );
    let fk = ForeignKeySpec::new(&["manager"], "emp", &["id"])
        .named("emp_manager_fk")
        .on_update(ReferenceAction::Cascade);
    catalog_with(vec![(emp, vec![fk])])
}

#[test]
fn cascading_updates_fall_back_to_the_executor() {
    let catalog = parent_child_catalog(|fk| fk.on_update(ReferenceAction::Cascade));
    let planner = planner(&catalog);

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("parent", vec![Assignment::new("p", sql("p + 1"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());

    let mut md = Metadata::new();
    let stmt = UpsertStatement::new("parent", values(&[&["1", "'uno'"]]))
        .on_conflict(&["p"], vec![Assignment::new("p", sql("p + 100"))]);
    let plan = planner.plan_upsert(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());

    // Deletes are still NO ACTION.
    let mut md = Metadata::new();
    let plan = planner
        .plan_delete(&mut md, &DeleteStatement::new("parent"))
        .unwrap();
    assert_eq!(plan.mutation().unwrap().checks.len(), 1);
}

#[test]
fn cascading_update_drops_insertion_checks_too() {
    let catalog = cascading_emp_catalog();
    let planner = planner(&catalog);

    // Moving only the manager needs just the insertion check.
    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("emp", vec![Assignment::new("manager", sql("7"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert_eq!(m.checks.len(), 1);
    assert_eq!(m.checks[0].direction, FkDirection::Outbound);
    assert!(m.private.with_id.is_some());

    let mut md = Metadata::new();
    let stmt = UpdateStatement::new(
        "emp",
        vec![
            Assignment::new("manager", sql("7")),
            Assignment::new("id", sql("id + 1")),
        ],
    );
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());

    let mut md = Metadata::new();
    let stmt = UpsertStatement::new("emp", values(&[&["1", "2"]]))
        .on_conflict(&["id"], vec![Assignment::new("id", sql("id + 100"))]);
    let plan = planner.plan_upsert(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());
}

#[test]
fn cascading_keys_fall_back_to_the_executor() {
    init_tracing_for_tests();
    let catalog = parent_child_catalog(|fk| fk.on_delete(ReferenceAction::Cascade));
    let planner = MutationPlanner::new(catalog);

    let mut md = Metadata::new();
    let plan = planner
        .plan_delete(&mut md, &DeleteStatement::new("parent"))
        .unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());

    // ON UPDATE is still NO ACTION.
    let mut md = Metadata::new();
    let stmt = UpdateStatement::new("parent", vec![Assignment::new("p", sql("p + 1"))]);
    let plan = planner.plan_update(&mut md, &stmt).unwrap();
    let m = plan.mutation().unwrap();
    assert_eq!(m.checks.len(), 1);
    assert!(!m.private.fk_fallback);
}

#[test]
fn disabled_checks_fall_back_to_the_executor() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(parent_child_catalog(|fk| fk))
        .with_settings(MutationSettings::default().with_optimizer_fk_checks(false));
    let (md, plan) = insert_child(&planner, &[&["11", "9", "'bad'"]]);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(m.private.fk_fallback);
    assert!(m.private.with_id.is_none());
    assert_eq!(md.tables().len(), 1);
}

#[test]
fn tables_being_added_are_skipped() {
    let (catalog, _) = family();
    let parent_id = catalog.table("parent").unwrap().id;
    catalog.set_adding(parent_id, true).unwrap();
    let planner = planner(&catalog);

    let (_, plan) = insert_child(&planner, &[&["11", "9", "'bad'"]]);
    let plan = plan.unwrap();
    let m = plan.mutation().unwrap();
    assert!(m.checks.is_empty());
    assert!(!m.private.fk_fallback);
}

#[test]
fn referenced_table_must_be_readable() {
    let (catalog, _) = family();
    let parent_id = catalog.table("parent").unwrap().id;
    let planner = planner(&catalog)
        .with_privileges(Arc::new(DenyTables::new("alice").deny(parent_id)));

    let (_, plan) = insert_child(&planner, &[&["11", "1", "'x'"]]);
    assert_eq!(
        plan.unwrap_err(),
        Error::PermissionDenied {
            user: "alice".into(),
            privilege: "SELECT".into(),
            relation: "parent".into(),
        }
    );
}
