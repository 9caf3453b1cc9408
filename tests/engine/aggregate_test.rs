#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{registry, shop_store, targets};
use strata::config::AccessSettings;
use strata::engine::{AggregateSource, Measure, QueryEngine, ReportDefinition};
use strata::error::ReportError;
use strata::relation::AggregateFunc;
use strata::store::StaticAccessFilter;
use strata::tree::{ResultTree, NAME_FIELD};
use strata::value::Value;

const COUNT: &str = "Sales count";

fn engine() -> QueryEngine {
    QueryEngine::new(registry())
}

fn sales_by_product() -> ReportDefinition {
    ReportDefinition::from_layer_specs(&["Category", "Product"])
        .unwrap()
        .with_aggregate(AggregateSource::count("Product", "Sales"))
}

/// Value of `field` on the node reached by child indexes from the root.
fn at<'a>(tree: &'a ResultTree, path: &[usize], field: &str) -> Option<&'a Value> {
    let mut node = tree.root();
    for &index in path {
        node = tree.child(node, index)?;
    }
    tree.field(node, field)
}

#[test]
fn test_counts_at_every_level() {
    let store = shop_store();
    let tree = engine()
        .report(&sales_by_product(), &store, &targets("Category", &[1, 2]))
        .unwrap();

    assert_eq!(at(&tree, &[], COUNT), Some(&Value::Int(3)));
    // Garden has no sales, Tools has them all
    assert_eq!(at(&tree, &[0], COUNT), None);
    assert_eq!(at(&tree, &[1], COUNT), Some(&Value::Int(3)));
    // Rake, Hose, Hammer, Saw
    assert_eq!(at(&tree, &[0, 0], COUNT), None);
    assert_eq!(at(&tree, &[0, 1], COUNT), None);
    assert_eq!(at(&tree, &[1, 0], COUNT), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[1, 1], COUNT), Some(&Value::Int(1)));

    // identity + one relation per prefix
    assert_eq!(store.executed_count(), 4);
}

#[test]
fn test_plan_has_one_relation_per_prefix() {
    let plan = engine().configure(&sales_by_product()).unwrap();

    let depths: Vec<usize> = plan.aggregates().iter().map(|a| a.depth).collect();
    assert_eq!(depths, vec![0, 1, 2]);
    for aggregate in plan.aggregates() {
        assert_eq!(aggregate.relation.group_by.len(), aggregate.depth);
        assert_eq!(aggregate.fields, vec![COUNT]);
    }

    insta::assert_snapshot!(plan.aggregates()[1].relation.to_string(), @r"
    SELECT COUNT(Sales.id) AS sales_count, Category.id AS category_id
    FROM categories AS Category
    INNER JOIN products AS Product ON Category.id = Product.category_id
    INNER JOIN sales AS Sales ON Product.id = Sales.product_id
    GROUP BY Category.id
    ");
}

#[test]
fn test_targets_restrict_aggregates() {
    let store = shop_store();
    let tree = engine()
        .report(&sales_by_product(), &store, &targets("Product", &[10]))
        .unwrap();

    assert_eq!(at(&tree, &[], COUNT), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[0], NAME_FIELD), Some(&Value::from("Tools")));
    assert_eq!(at(&tree, &[0, 0], COUNT), Some(&Value::Int(2)));
}

#[test]
fn test_grand_total_of_nothing_is_zero() {
    let store = shop_store();
    let tree = engine()
        .report(&sales_by_product(), &store, &targets("Product", &[21]))
        .unwrap();

    assert_eq!(at(&tree, &[], COUNT), Some(&Value::Int(0)));
    assert_eq!(at(&tree, &[0], NAME_FIELD), Some(&Value::from("Garden")));
    assert_eq!(at(&tree, &[0], COUNT), None);
    assert_eq!(at(&tree, &[0, 0], COUNT), None);
}

#[test]
fn test_several_measures() {
    let store = shop_store();
    let source = AggregateSource::count("Category", "Sales")
        .with_measure(Measure::of(AggregateFunc::Sum, "amount"))
        .with_measure(Measure::of(AggregateFunc::Max, "amount"));
    let definition = ReportDefinition::from_layer_specs(&["Category"])
        .unwrap()
        .with_aggregate(source);

    let tree = engine()
        .report(&definition, &store, &targets("Category", &[1, 2]))
        .unwrap();

    assert_eq!(at(&tree, &[], "Sales sum amount"), Some(&Value::Int(15)));
    assert_eq!(at(&tree, &[0], "Sales sum amount"), None);
    assert_eq!(at(&tree, &[1], "Sales sum amount"), Some(&Value::Int(15)));
    assert_eq!(at(&tree, &[1], "Sales max amount"), Some(&Value::Int(7)));
    assert_eq!(at(&tree, &[1], COUNT), Some(&Value::Int(3)));
}

#[test]
fn test_distinct_count_per_store() {
    let store = shop_store();
    let definition = ReportDefinition::from_layer_specs(&["Store"])
        .unwrap()
        .with_aggregate(
            AggregateSource::count("Store", "Sales").with_measure(Measure::count_distinct("product_id")),
        );

    let tree = engine()
        .report(&definition, &store, &targets("Store", &[1, 2]))
        .unwrap();

    let distinct = "Sales count_distinct product_id";
    assert_eq!(at(&tree, &[0], NAME_FIELD), Some(&Value::from("North")));
    assert_eq!(at(&tree, &[0], COUNT), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[0], distinct), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[1], COUNT), Some(&Value::Int(1)));
    assert_eq!(at(&tree, &[1], distinct), Some(&Value::Int(1)));
    assert_eq!(at(&tree, &[], distinct), Some(&Value::Int(2)));
}

#[test]
fn test_subgroup_aggregates() {
    let store = shop_store();
    let definition = ReportDefinition::from_layer_specs(&["Product.color"])
        .unwrap()
        .with_aggregate(AggregateSource::count("Product", "Sales"));

    let tree = engine()
        .report(&definition, &store, &targets("Product", &[10, 11, 20, 21]))
        .unwrap();

    // blue, green, red
    assert_eq!(at(&tree, &[0], COUNT), Some(&Value::Int(1)));
    assert_eq!(at(&tree, &[1], COUNT), None);
    assert_eq!(at(&tree, &[2], COUNT), Some(&Value::Int(2)));
}

#[test]
fn test_data_unreachable_from_layers() {
    let definition = ReportDefinition::from_layer_specs(&["Category", "Product"])
        .unwrap()
        .with_aggregate(AggregateSource::count("Store", "Sales"));

    let err = engine().configure(&definition).unwrap_err();
    assert_eq!(
        err,
        ReportError::JoinUnreachable {
            target: "Sales".into(),
            attempted: vec!["Category".into(), "Product".into()],
        }
    );
}

#[test]
fn test_access_filter_applies_to_aggregates() {
    let store = shop_store();
    let rules = BTreeMap::from([(
        "Sales".to_string(),
        AccessSettings {
            condition: BTreeMap::from([("Store.name".to_string(), Value::from("North"))]),
            join_paths: vec![vec!["Sales".into(), "Store".into()]],
        },
    )]);
    let engine = engine().with_access_filter(Arc::new(StaticAccessFilter::new(rules)));

    let tree = engine
        .report(&sales_by_product(), &store, &targets("Category", &[1, 2]))
        .unwrap();

    // Sale 101 was made in South
    assert_eq!(at(&tree, &[], COUNT), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[1], COUNT), Some(&Value::Int(2)));
    assert_eq!(at(&tree, &[1, 0], COUNT), Some(&Value::Int(1)));
    assert_eq!(at(&tree, &[1, 1], COUNT), Some(&Value::Int(1)));
    // identity rows never join Sales, so both categories stay
    assert_eq!(tree.children(tree.root()).len(), 2);
}
