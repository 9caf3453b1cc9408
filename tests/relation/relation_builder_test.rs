#[path = "../common/mod.rs"]
mod common;

use common::{registry, shop_store, targets};
use strata::entity::Layer;
use strata::error::{ReportError, ReportResult};
use strata::planner::{Condition, RelationBuilder};
use strata::relation::{col, lit, ColumnRef};
use strata::store::{AccessRule, DataStore};
use strata::value::Value;

fn builder(spine: &[&str]) -> RelationBuilder {
    RelationBuilder::new(registry(), spine)
}

#[test]
fn test_join_across_intermediate_entities() {
    let mut builder = builder(&["Category", "Store"]);
    builder.join_path(&["Category", "Store"]).unwrap();

    assert_eq!(builder.joined(), ["Category", "Product", "Sales", "Store"]);

    builder.select_column(&ColumnRef::new("Category", "name")).unwrap();
    builder.select_column(&ColumnRef::new("Store", "name")).unwrap();
    builder.distinct().unwrap();
    let relation = builder.finish().unwrap();

    let rows = shop_store().execute(&relation).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("Tools"), Value::from("North")],
            vec![Value::from("Tools"), Value::from("South")],
        ]
    );
    assert_eq!(relation.projections[1].alias, "store_name");
}

#[test]
fn test_identity_columns_for_layers() {
    let mut builder = builder(&["Product"]);
    builder.join_to_entity("Product").unwrap();

    let color = builder.select_identity_column(&Layer::subgroup("Product", "color")).unwrap();
    let id = builder.select_identity_column(&Layer::entity("Product")).unwrap();
    builder.distinct().unwrap();
    builder
        .apply_condition(Condition::Records(targets("Product", &[20, 21])))
        .unwrap();

    assert_eq!((color.as_str(), id.as_str()), ("product_color", "product_id"));

    let rows = shop_store().execute(&builder.finish().unwrap()).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from("green"), Value::Int(20)],
            vec![Value::from("green"), Value::Int(21)],
        ]
    );
}

#[test]
fn test_condition_joins_referenced_entities() {
    let mut builder = builder(&["Category"]);
    builder.join_to_entity("Category").unwrap();
    builder.select_column(&ColumnRef::new("Category", "id")).unwrap();
    builder.apply_condition(col("Store", "name").eq(lit("South"))).unwrap();
    builder.distinct().unwrap();

    assert!(builder.is_joined("Sales"));
    let rows = shop_store().execute(&builder.finish().unwrap()).unwrap();
    assert_eq!(rows, vec![vec![Value::Int(1)]]);
}

#[test]
fn test_unreachable_entity() {
    let mut builder = builder(&["Category"]);
    builder.join_to_entity("Category").unwrap();

    let err = builder.join_to_entity("Island").unwrap_err();
    assert_eq!(
        err,
        ReportError::JoinUnreachable {
            target: "Island".into(),
            attempted: vec!["Category".into()],
        }
    );
}

#[test]
fn test_closure_access_filter() {
    let filter = |entity: &str| -> ReportResult<AccessRule> {
        Ok(match entity {
            "Product" => AccessRule {
                condition: Some(col("Store", "name").eq(lit("North"))),
                extra_join_paths: vec![vec!["Product".into(), "Store".into()]],
            },
            _ => AccessRule::default(),
        })
    };

    let mut builder = builder(&["Category", "Product"]);
    builder.join_path(&["Category", "Product"]).unwrap();
    builder.select_column(&ColumnRef::new("Product", "id")).unwrap();
    builder.distinct().unwrap();
    builder.apply_access_filter(&filter).unwrap();

    assert_eq!(builder.joined(), ["Category", "Product", "Sales", "Store"]);
    let rows = shop_store().execute(&builder.finish().unwrap()).unwrap();
    assert_eq!(rows, vec![vec![Value::Int(10)], vec![Value::Int(11)]]);
}
