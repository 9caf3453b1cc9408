#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{registry, shop_store, targets};
use strata::config::AccessSettings;
use strata::engine::{QueryEngine, ReportDefinition};
use strata::entity::Layer;
use strata::error::ReportError;
use strata::store::StaticAccessFilter;
use strata::tree::{NodeId, ResultTree, ID_FIELD, NAME_FIELD, TYPE_FIELD};
use strata::value::Value;

fn engine() -> QueryEngine {
    QueryEngine::new(registry())
}

fn layers(specs: &[&str]) -> ReportDefinition {
    ReportDefinition::from_layer_specs(specs).unwrap()
}

fn ids(tree: &ResultTree, parent: NodeId) -> Vec<Value> {
    tree.children(parent)
        .iter()
        .map(|&child| tree.field(child, ID_FIELD).cloned().unwrap_or_default())
        .collect()
}

#[test]
fn test_two_layer_tree() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Category", "Product"]), &store, &targets("Category", &[1, 2]))
        .unwrap();

    let root = tree.root();
    assert_eq!(tree.get(root).unwrap().type_name(), "Report");
    // Categories order by name
    assert_eq!(ids(&tree, root), vec![Value::Int(2), Value::Int(1)]);

    let garden = tree.child(root, 0).unwrap();
    let tools = tree.child(root, 1).unwrap();
    assert_eq!(tree.field(garden, NAME_FIELD), Some(&Value::from("Garden")));
    assert_eq!(ids(&tree, garden), vec![Value::Int(20), Value::Int(21)]);
    assert_eq!(ids(&tree, tools), vec![Value::Int(10), Value::Int(11)]);

    let hammer = tree.child(tools, 0).unwrap();
    let node = tree.get(hammer).unwrap();
    assert_eq!(node.type_name(), "Product");
    let names: Vec<&str> = node.fields().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec![ID_FIELD, NAME_FIELD, TYPE_FIELD, "color"]);
    assert_eq!(node.field(NAME_FIELD), Some(&Value::from("Hammer")));
    assert_eq!(node.field(TYPE_FIELD), Some(&Value::from("Product")));
    assert_eq!(node.field("color"), Some(&Value::from("red")));
    assert_eq!(tree.len(), 7);
}

#[test]
fn test_all_products_give_two_by_two_tree() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Category", "Product"]), &store, &targets("Product", &[10, 11, 20, 21]))
        .unwrap();

    let root = tree.root();
    assert_eq!(tree.children(root).len(), 2);
    for &category in tree.children(root) {
        assert_eq!(tree.children(category).len(), 2);
        for &product in tree.children(category) {
            assert!(tree.children(product).is_empty());
        }
    }
    assert_eq!(tree.leaves().len(), 4);
}

#[test]
fn test_single_layer_tree() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Product"]), &store, &targets("Product", &[11, 10]))
        .unwrap();

    assert_eq!(ids(&tree, tree.root()), vec![Value::Int(10), Value::Int(11)]);
    assert!(tree.children(tree.child(tree.root(), 0).unwrap()).is_empty());
}

#[test]
fn test_inner_layer_targets_restrict_outer_layers() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Category", "Product"]), &store, &targets("Product", &[20]))
        .unwrap();

    assert_eq!(ids(&tree, tree.root()), vec![Value::Int(2)]);
    let garden = tree.child(tree.root(), 0).unwrap();
    assert_eq!(ids(&tree, garden), vec![Value::Int(20)]);
}

#[test]
fn test_layer_path_with_intermediate_entity() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Store", "Product"]), &store, &targets("Store", &[1, 2]))
        .unwrap();

    let north = tree.child(tree.root(), 0).unwrap();
    let south = tree.child(tree.root(), 1).unwrap();
    assert_eq!(tree.field(north, NAME_FIELD), Some(&Value::from("North")));
    assert_eq!(ids(&tree, north), vec![Value::Int(10), Value::Int(11)]);
    assert_eq!(ids(&tree, south), vec![Value::Int(10)]);
}

#[test]
fn test_empty_targets_execute_nothing() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Category", "Product"]), &store, &[])
        .unwrap();

    assert!(tree.is_empty());
    assert_eq!(tree.get(tree.root()).unwrap().type_name(), "Report");
    assert_eq!(store.executed_count(), 0);
}

#[test]
fn test_disconnected_layers() {
    let store = shop_store();
    let err = engine()
        .report(&layers(&["Category", "Island"]), &store, &targets("Category", &[1]))
        .unwrap_err();

    assert_eq!(
        err,
        ReportError::PathNotFound {
            from: "Category".into(),
            to: "Island".into(),
            requested: vec!["Category".into(), "Island".into()],
        }
    );
    assert_eq!(store.executed_count(), 0);
}

#[test]
fn test_layers_that_double_back() {
    let err = engine()
        .configure(&layers(&["Product", "Store", "Category"]))
        .unwrap_err();

    assert_eq!(
        err,
        ReportError::PathDoublesBack {
            entity: "Sales".into(),
            cycle: vec!["Sales".into(), "Store".into(), "Sales".into()],
        }
    );
}

#[test]
fn test_no_layers() {
    let err = engine().configure(&ReportDefinition::new(vec![])).unwrap_err();
    assert!(matches!(err, ReportError::ConfigurationError(_)));

    assert!(matches!(
        ReportDefinition::from_layer_specs(&["Product."]),
        Err(ReportError::ConfigurationError(_))
    ));
}

#[test]
fn test_invalid_targets() {
    let store = shop_store();
    let engine = engine();
    let plan = engine.configure(&layers(&["Category", "Product"])).unwrap();

    let mut mixed = targets("Category", &[1]);
    mixed.extend(targets("Product", &[10]));
    let err = engine.run(&plan, &store, &mixed).unwrap_err();
    assert!(matches!(err, ReportError::InvalidTarget(_)));

    let err = engine.run(&plan, &store, &targets("Store", &[1])).unwrap_err();
    assert!(matches!(err, ReportError::InvalidTarget(_)));

    assert_eq!(store.executed_count(), 0);
}

#[test]
fn test_subgroup_layer() {
    let store = shop_store();
    let tree = engine()
        .report(
            &layers(&["Product.color", "Product"]),
            &store,
            &targets("Product", &[10, 11, 20, 21]),
        )
        .unwrap();

    let root = tree.root();
    assert_eq!(
        ids(&tree, root),
        vec![Value::from("blue"), Value::from("green"), Value::from("red")]
    );

    let green = tree.child(root, 1).unwrap();
    let node = tree.get(green).unwrap();
    assert_eq!(node.type_name(), "Product.color");
    assert_eq!(node.field(NAME_FIELD), Some(&Value::from("green")));
    assert_eq!(node.field(TYPE_FIELD), Some(&Value::from("Product.color")));
    assert_eq!(ids(&tree, green), vec![Value::Int(20), Value::Int(21)]);
}

#[test]
fn test_subgroup_under_entity_layer() {
    let store = shop_store();
    let definition = ReportDefinition::new(vec![
        Layer::entity("Category"),
        Layer::subgroup("Product", "color"),
    ]);
    let tree = engine()
        .report(&definition, &store, &targets("Category", &[1, 2]))
        .unwrap();

    let garden = tree.child(tree.root(), 0).unwrap();
    let tools = tree.child(tree.root(), 1).unwrap();
    assert_eq!(ids(&tree, garden), vec![Value::from("green")]);
    assert_eq!(ids(&tree, tools), vec![Value::from("blue"), Value::from("red")]);
}

#[test]
fn test_access_filter_restricts_identity() {
    let store = shop_store();
    let rules = BTreeMap::from([(
        "Product".to_string(),
        AccessSettings {
            condition: BTreeMap::from([("color".to_string(), Value::from("green"))]),
            join_paths: vec![],
        },
    )]);
    let engine = engine().with_access_filter(Arc::new(StaticAccessFilter::new(rules)));

    let tree = engine
        .report(&layers(&["Category", "Product"]), &store, &targets("Category", &[1, 2]))
        .unwrap();

    assert_eq!(ids(&tree, tree.root()), vec![Value::Int(2)]);
    let garden = tree.child(tree.root(), 0).unwrap();
    assert_eq!(ids(&tree, garden), vec![Value::Int(20), Value::Int(21)]);
}

#[test]
fn test_plan_is_reusable() {
    let store = shop_store();
    let engine = engine();
    let plan = engine
        .configure(&layers(&["Category", "Product"]).with_root_name("Shop"))
        .unwrap();

    assert_eq!(plan.canonical_path(), ["Category", "Product"]);
    insta::assert_snapshot!(plan.identity().to_string(), @r"
    SELECT DISTINCT Category.id AS category_id, Product.id AS product_id
    FROM categories AS Category
    INNER JOIN products AS Product ON Category.id = Product.category_id
    ");

    let first = engine.run(&plan, &store, &targets("Category", &[1])).unwrap();
    let second = engine.run(&plan, &store, &targets("Category", &[2])).unwrap();
    assert_eq!(first.get(first.root()).unwrap().type_name(), "Shop");
    assert_eq!(ids(&first, first.root()), vec![Value::Int(1)]);
    assert_eq!(ids(&second, second.root()), vec![Value::Int(2)]);
    assert_eq!(store.executed_count(), 2);
}

#[test]
fn test_flatten_and_json() {
    let store = shop_store();
    let tree = engine()
        .report(&layers(&["Category", "Product"]), &store, &targets("Product", &[20]))
        .unwrap();

    let flat = tree.flatten();
    assert_eq!(flat.rows.len(), 1);
    assert_eq!(
        flat.columns,
        vec![
            "Category.id",
            "Category.name",
            "Category.internalTypeName",
            "Product.id",
            "Product.name",
            "Product.internalTypeName",
            "Product.color",
        ]
    );

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["children"][0]["name"], "Garden");
    assert_eq!(json["children"][0]["children"][0]["fields"]["color"], "green");
}
