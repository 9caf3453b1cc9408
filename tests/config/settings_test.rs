use std::env;
use std::fs;
use std::sync::Arc;

use strata::config::{Settings, SettingsError};
use strata::engine::{QueryEngine, ReportDefinition};
use strata::error::ReportError;
use strata::graph::GraphRegistry;
use strata::schema::StaticSchema;
use strata::store::{EntityRecord, MemoryStore, StaticAccessFilter};
use strata::value::Value;

const CONFIG: &str = r#"
[engine]
root_name = "Shop"

[logging]
filter = "strata=debug"

[store]
schema = "${STRATA_SETTINGS_TEST_DIR}/schema.toml"
data = "${STRATA_SETTINGS_TEST_DIR}/data.json"

[reports.sales_by_product]
layers = ["Category", "Product"]

[[reports.sales_by_product.aggregates]]
focus = "Product"
data = "Sales"
measures = ["count", "sum:amount"]

[reports.colors]
layers = ["Product.color"]
root_name = "Palette"

[[reports.colors.aggregates]]
focus = "Product"
data = "Sales"

[access.Sales]
condition = { "Store.name" = "North" }
join_paths = [["Sales", "Store"]]
"#;

const SCHEMA: &str = r#"
[[entity]]
name = "Category"
name_column = "name"

[[entity.associations]]
name = "products"
target = "Product"
cardinality = "many"
foreign_key = "category_id"

[[entity]]
name = "Product"
display_fields = ["color"]

[[entity.associations]]
name = "sales"
target = "Sales"
cardinality = "many"
foreign_key = "product_id"

[[entity]]
name = "Sales"

[[entity.associations]]
name = "store"
target = "Store"
cardinality = "one"
foreign_key = "store_id"

[[entity]]
name = "Store"
"#;

const DATA: &str = r#"{
  "Category": [{"id": 1, "name": "Tools"}],
  "Product": [
    {"id": 10, "color": "red", "category_id": 1},
    {"id": 11, "color": "blue", "category_id": 1}
  ],
  "Sales": [
    {"id": 100, "product_id": 10, "store_id": 1, "amount": 5},
    {"id": 101, "product_id": 10, "store_id": 2, "amount": 7},
    {"id": 102, "product_id": 11, "store_id": 1, "amount": 2.5}
  ],
  "Store": [{"id": 1, "name": "North"}, {"id": 2, "name": "South"}]
}"#;

#[test]
fn test_parse_full_config() {
    let settings = Settings::from_toml(CONFIG).unwrap();

    assert_eq!(settings.engine.root_name, "Shop");
    assert_eq!(settings.engine.through_hint_min_nodes, 3);
    assert_eq!(settings.logging.filter, "strata=debug");

    let report = settings.report("sales_by_product").unwrap();
    assert_eq!(report.layers, vec!["Category", "Product"]);
    assert_eq!(report.aggregates[0].measures, vec!["count", "sum:amount"]);
    assert_eq!(settings.root_name_for(report), "Shop");

    let colors = settings.report("colors").unwrap();
    assert_eq!(colors.aggregates[0].measures, vec!["count"]);
    assert_eq!(settings.root_name_for(colors), "Palette");

    let access = &settings.access["Sales"];
    assert_eq!(access.condition["Store.name"], Value::from("North"));

    assert!(matches!(
        settings.report("missing"),
        Err(SettingsError::ReportNotFound(_))
    ));
}

#[test]
fn test_unknown_report_keys_rejected() {
    let err = Settings::from_toml(
        r#"
[reports.broken]
layers = ["Product"]
limit = 10
"#,
    )
    .unwrap_err();

    assert!(matches!(err, SettingsError::ParseError(_)));
    assert!(matches!(ReportError::from(err), ReportError::ConfigurationError(_)));
}

#[test]
fn test_unknown_measure_rejected() {
    let settings = Settings::from_toml(
        r#"
[reports.broken]
layers = ["Product"]

[[reports.broken.aggregates]]
focus = "Product"
data = "Sales"
measures = ["median:amount"]
"#,
    )
    .unwrap();

    let err = ReportDefinition::from_settings(&settings, settings.report("broken").unwrap()).unwrap_err();
    assert!(matches!(err, ReportError::ConfigurationError(_)));
}

#[test]
fn test_missing_config_file() {
    let err = Settings::from_file("/nonexistent/strata.toml").unwrap_err();
    assert!(matches!(err, SettingsError::FileNotFound(_)));
}

#[test]
fn test_report_from_config_files() {
    let dir = env::temp_dir().join(format!("strata-settings-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("schema.toml"), SCHEMA).unwrap();
    fs::write(dir.join("data.json"), DATA).unwrap();
    env::set_var("STRATA_SETTINGS_TEST_DIR", &dir);

    let settings = Settings::from_toml(CONFIG).unwrap();
    let schema_path = settings.store.resolved_schema_path().unwrap().unwrap();
    let data_path = settings.store.resolved_data_path().unwrap().unwrap();
    assert_eq!(data_path, dir.join("data.json"));

    let schema = StaticSchema::from_file(&schema_path).unwrap();
    let store = MemoryStore::from_file(&data_path).unwrap();
    let engine = QueryEngine::new(GraphRegistry::new(Arc::new(schema)))
        .with_access_filter(Arc::new(StaticAccessFilter::new(settings.access.clone())));

    let definition =
        ReportDefinition::from_settings(&settings, settings.report("sales_by_product").unwrap()).unwrap();
    let tree = engine
        .report(&definition, &store, &[EntityRecord::new("Category", Value::Int(1))])
        .unwrap();

    let root = tree.root();
    assert_eq!(tree.get(root).unwrap().type_name(), "Shop");
    // Sale 101 is South, hidden by the access rule
    assert_eq!(tree.field(root, "Sales count"), Some(&Value::Int(2)));
    assert_eq!(tree.field(root, "Sales sum amount"), Some(&Value::Float(7.5)));

    let tools = tree.child(root, 0).unwrap();
    assert_eq!(tree.field(tools, "name"), Some(&Value::from("Tools")));
    let red = tree.child(tools, 0).unwrap();
    assert_eq!(tree.field(red, "color"), Some(&Value::from("red")));
    assert_eq!(tree.field(red, "Sales sum amount"), Some(&Value::Int(5)));

    env::remove_var("STRATA_SETTINGS_TEST_DIR");
    fs::remove_dir_all(&dir).unwrap();
}
