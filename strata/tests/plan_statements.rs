use strata::plan::{
    Assignment, DeleteStatement, InsertSource, InsertStatement, Metadata, MutationSettings,
    MutationStatement, RelExpr, ReturningItem, UpdateStatement, ValueOrDefault, ValuesClause,
    explain,
};
use strata::{Error, MutationPlanner};
use strata_test_utils::fixtures::{parent_child_catalog, sql, xyz_catalog};
use strata_test_utils::init_tracing_for_tests;

#[test]
fn statements_dispatch_to_their_planner() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(xyz_catalog());
    let statements = [
        MutationStatement::Insert(InsertStatement::new(
            "t",
            InsertSource::Values(ValuesClause::new(vec![vec![
                ValueOrDefault::Expr(sql("1")),
                ValueOrDefault::Expr(sql("2")),
                ValueOrDefault::Expr(sql("3")),
            ]])),
        )),
        MutationStatement::Update(UpdateStatement::new(
            "t",
            vec![Assignment::new("y", sql("y + 1"))],
        )),
        MutationStatement::Delete(DeleteStatement::new("t")),
    ];
    for (stmt, prefix) in statements.iter().zip(["insert t", "update t", "delete t"]) {
        let mut md = Metadata::new();
        let plan = planner.plan(&mut md, stmt).unwrap();
        assert!(matches!(plan.root, RelExpr::Mutation(_)));
        assert!(plan.output.is_empty());
        let text = explain(&plan.root, &md);
        assert!(text.starts_with(prefix), "{text}");
    }
}

#[test]
fn explain_shows_delete_check() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(parent_child_catalog(|fk| fk));
    let mut md = Metadata::new();
    let stmt = DeleteStatement::new("parent").with_filter(sql("p = 1"));
    let plan = planner
        .plan(&mut md, &MutationStatement::Delete(stmt))
        .unwrap();
    let text = explain(&plan.root, &md);

    assert!(text.starts_with("delete parent\n"), "{text}");
    assert!(text.contains("  fetch-cols (@3,@4)\n"), "{text}");
    assert!(text.contains("  buffer &1\n"), "{text}");
    assert!(text.contains("    select @3 = 1\n"), "{text}");
    assert!(text.contains("  fk-check inbound fk key="), "{text}");
    assert!(text.contains("semi-join on ("), "{text}");
    assert!(text.contains("with-scan &1 (@3) -> "), "{text}");
    assert!(text.contains("scan child "), "{text}");
    assert!(text.contains(" ignore-fks\n"), "{text}");
}

#[test]
fn returning_wraps_the_mutation() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(xyz_catalog());
    let mut md = Metadata::new();
    let stmt = DeleteStatement::new("t").with_returning(vec![ReturningItem::Star]);
    let plan = planner.plan_delete(&mut md, &stmt).unwrap();

    assert!(matches!(plan.root, RelExpr::Project { .. }));
    assert!(plan.mutation().is_some());
    let names: Vec<_> = plan.output.iter().map(|c| c.name.as_deref()).collect();
    assert_eq!(names, vec![Some("x"), Some("y"), Some("z")]);
    assert!(explain(&plan.root, &md).starts_with("project passthrough="));
}

#[test]
fn disabled_checks_are_visible_in_explain() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(parent_child_catalog(|fk| fk))
        .with_settings(MutationSettings::default().with_optimizer_fk_checks(false));
    let mut md = Metadata::new();
    let plan = planner
        .plan_delete(&mut md, &DeleteStatement::new("parent"))
        .unwrap();
    let text = explain(&plan.root, &md);
    assert!(text.contains("  fk-fallback\n"), "{text}");
    assert!(!text.contains("fk-check"), "{text}");
}

#[test]
fn unknown_table_is_reported() {
    init_tracing_for_tests();
    let planner = MutationPlanner::new(xyz_catalog());
    let mut md = Metadata::new();
    let err = planner
        .plan_delete(&mut md, &DeleteStatement::new("nope"))
        .unwrap_err();
    assert_eq!(err, Error::CatalogError("relation \"nope\" does not exist".into()));
}
