#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use common::registry;
use strata::error::ReportError;
use strata::graph::{EntityGraph, GraphRegistry};
use strata::schema::StaticSchema;

const SCHEMA: &str = r#"
[[entity]]
name = "Sale"
storage = "sales"

[[entity.associations]]
name = "store"
target = "Store"
cardinality = "one"
foreign_key = "store_id"

[[entity]]
name = "ReturnedSale"
storage = "sales"
lineage = ["Sale"]

[[entity.associations]]
name = "store"
target = "Store"
cardinality = "one"
foreign_key = "store_id"

[[entity]]
name = "Refund"
storage = "sales"

[[entity]]
name = "Store"
storage = "stores"
"#;

fn toml_registry() -> GraphRegistry {
    GraphRegistry::new(Arc::new(StaticSchema::from_toml(SCHEMA).unwrap()))
}

#[test]
fn test_shared_storage_with_lineage() {
    let registry = toml_registry();

    let added = registry.register(&["Sale", "ReturnedSale"]).unwrap();
    assert_eq!(added, vec!["Sale", "ReturnedSale", "Store"]);
    assert_eq!(
        registry.shortest_path("ReturnedSale", "Store").unwrap(),
        vec!["ReturnedSale", "Store"]
    );
}

#[test]
fn test_shared_storage_without_lineage() {
    let registry = toml_registry();
    registry.register(&["Sale"]).unwrap();

    let err = registry.register(&["Refund"]).unwrap_err();
    assert_eq!(
        err,
        ReportError::SchemaConflict {
            storage: "sales".into(),
            first: "Sale".into(),
            second: "Refund".into(),
        }
    );
    // Nothing from the failed registration was kept
    assert_eq!(registry.entity_count(), 2);
}

#[test]
fn test_paths_are_memoized() {
    let registry = registry();

    let first = registry.shortest_path("Category", "Store").unwrap();
    let count = registry.entity_count();
    let second = registry.shortest_path("Category", "Store").unwrap();

    assert_eq!(first, vec!["Category", "Product", "Sales", "Store"]);
    assert_eq!(first, second);
    assert_eq!(registry.entity_count(), count);
    assert_eq!(
        registry.with_graph(|graph| graph.distance("Store", "Category")),
        Some(3)
    );
}

#[test]
fn test_registry_shared_between_threads() {
    let registry = registry();

    let paths: Vec<Vec<String>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                scope.spawn(move || registry.shortest_path("Store", "Category").unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for path in &paths {
        assert_eq!(path, &vec!["Store", "Sales", "Product", "Category"]);
    }
    assert_eq!(registry.entity_count(), 4);
}

#[test]
fn test_through_hint_threshold() {
    let schema = StaticSchema::from_toml(
        r#"
[[entity]]
name = "Product"

[[entity.associations]]
name = "brand"
target = "Brand"
cardinality = "one"
foreign_key = "brand_id"

[[entity.associations]]
name = "categorizations"
target = "Categorization"
cardinality = "many"
foreign_key = "product_id"

[[entity.associations]]
name = "categories"
target = "Category"
cardinality = "many"
through = "Categorization"

[[entity]]
name = "Brand"

[[entity.associations]]
name = "category"
target = "Category"
cardinality = "one"
foreign_key = "category_id"

[[entity]]
name = "Categorization"

[[entity.associations]]
name = "category"
target = "Category"
cardinality = "one"
foreign_key = "category_id"

[[entity]]
name = "Category"
"#,
    )
    .unwrap();
    let schema = Arc::new(schema);

    let hinted = GraphRegistry::from_graph(EntityGraph::new(schema.clone()));
    let path = hinted.shortest_path("Product", "Category").unwrap();
    assert_eq!(path, vec!["Product", "Categorization", "Category"]);

    let unhinted =
        GraphRegistry::from_graph(EntityGraph::new(schema).with_through_hint_min_nodes(4));
    let path = unhinted.shortest_path("Product", "Category").unwrap();
    assert_eq!(path, vec!["Product", "Brand", "Category"]);
}
