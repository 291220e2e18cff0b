//! End-to-end tests of the extraction and collection pipeline over a
//! fixture directory tree shaped like the real data archive.

use statgraph::collect::{self, Collector};
use statgraph::config::{CoordinatePlan, NodeConfig};
use statgraph::layout::DataRoot;
use statgraph::regions::RegionMatcher;
use statgraph::schema::{read_table_schema, TableCatalog};
use statgraph::table;

use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TABLE_BODY: &str = "Таблица 2.1. Тест\n;;\n№ строки;1;2;3\n01;42;10,5;\n02;7;;\n";

fn write_table(dir: &Path, value_row: &str) {
    fs::create_dir_all(dir).unwrap();
    let body = format!("Таблица 2.1. Тест\n;;\n№ строки;1;2;3\n{}\n", value_row);
    fs::write(dir.join("Раздел 2.1.csv"), body).unwrap();
}

/// Fixture: 2020 has no files at all, 2021 is fully populated.
fn fixture_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    fs::create_dir_all(root.join("2020")).unwrap();
    fs::create_dir_all(root.join("2021")).unwrap();
    fs::write(root.join("2021").join("Раздел 2.1.csv"), TABLE_BODY).unwrap();

    write_table(
        &root.join("2021").join("2021").join("Кемеровская область"),
        "01;5;6;",
    );
    write_table(&root.join("2021").join("2021").join("XYZ123"), "01;9;9;");
    fs::create_dir_all(root.join("2021").join("2021").join(".cache")).unwrap();

    tmp
}

fn single_plan() -> CoordinatePlan {
    let config = NodeConfig::from_value(&json!({
        "node_name": "test",
        "labels": "Indicator",
        "table_number": "2.1",
        "column": 2,
        "row": 1
    }))
    .unwrap();
    config.plan().unwrap()
}

#[test]
fn extract_reads_real_file() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let path = root.federal_table("2021", "2.1");

    assert_eq!(table::extract(&path, 2, 1).as_deref(), Some("42"));
    assert_eq!(table::extract(&path, 3, 1).as_deref(), Some("10,5"));
    // Row 2 column 3 is blank in the fixture.
    assert_eq!(table::extract(&path, 3, 2), None);
}

#[test]
fn federal_collection_marks_absent_years_missing() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let years = vec!["2020".to_string(), "2021".to_string()];

    let collector = Collector::new(&root, &years);
    let federal = collector.collect_federal(&single_plan());
    assert_eq!(federal, vec![None, Some(42.0)]);
}

#[test]
fn period_gaps_collect_as_missing() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let years = vec!["2020".to_string(), "2021".to_string()];

    let config = NodeConfig::from_value(&json!({
        "node_name": "test",
        "labels": "Indicator",
        "periods": [
            {"from": 2016, "to": 2020, "table_number": "2.1", "column": 2, "row": 1}
        ]
    }))
    .unwrap();
    let plan = config.plan().unwrap();

    let collector = Collector::new(&root, &years);
    let federal = collector.collect_federal(&plan);
    // 2020 is in the period but its file is absent; 2021 has data but no
    // configured period.
    assert_eq!(federal, vec![None, None]);
}

#[test]
fn regional_collection_without_matcher_uses_directory_names() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let years = vec!["2020".to_string(), "2021".to_string()];

    let collector = Collector::new(&root, &years);
    let (regions, matrix) = collector.collect_regional(&single_plan());

    assert_eq!(regions.len(), 2); // dot-prefixed directory excluded
    assert!(regions.contains(&"Кемеровская область".to_string()));
    assert!(regions.contains(&"XYZ123".to_string()));

    let idx = regions
        .iter()
        .position(|r| r == "Кемеровская область")
        .unwrap();
    assert_eq!(matrix[idx], vec![None, Some(5.0)]);
}

#[test]
fn regional_collection_with_matcher_canonicalizes_and_drops() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let years = vec!["2020".to_string(), "2021".to_string()];

    let matcher = RegionMatcher::new(vec!["Кемеровская область – Кузбасс".to_string()]);
    let collector = Collector::new(&root, &years).with_matcher(&matcher);
    let (regions, matrix) = collector.collect_regional(&single_plan());

    // XYZ123 cleared no canonical name and was dropped.
    assert_eq!(regions, vec!["Кемеровская область – Кузбасс".to_string()]);
    assert_eq!(matrix[0], vec![None, Some(5.0)]);
}

#[test]
fn raw_values_preserve_literal_text() {
    let tmp = fixture_tree();
    let root = DataRoot::new(tmp.path());
    let years = vec!["2020".to_string(), "2021".to_string()];

    let values = collect::collect_raw_values(&root, "2.1", 3, 1, &years);
    assert_eq!(values.get("2020"), Some(&None));
    assert_eq!(values.get("2021"), Some(&Some("10,5".to_string())));
}

#[test]
fn schema_reading_builds_dictionaries() {
    let tmp = TempDir::new().unwrap();
    let root_dir = tmp.path().join("2024");
    fs::create_dir_all(&root_dir).unwrap();
    let body = "Раздел 2.5\n;\n;\n;\n;\n;1;2;3\n№ п/п;Наименование;Всего;Женщины\n01;Численность студентов;;\n02;Численность преподавателей;;\n";
    fs::write(root_dir.join("Раздел 2.5.1.csv"), body).unwrap();

    let root = DataRoot::new(tmp.path());
    let schema = read_table_schema(&root, "2.5.1", "2024").unwrap();

    assert_eq!(schema.columns.get("2").map(String::as_str), Some("Всего"));
    assert_eq!(
        schema.rows.get("01").map(String::as_str),
        Some("Численность студентов")
    );

    let prompt = schema.prompt_text();
    assert!(prompt.contains("Всего"));
    assert!(prompt.contains("02"));
}

#[test]
fn schema_reading_rejects_short_files() {
    let tmp = TempDir::new().unwrap();
    let root_dir = tmp.path().join("2024");
    fs::create_dir_all(&root_dir).unwrap();
    fs::write(root_dir.join("Раздел 9.9.csv"), "too;short\n").unwrap();

    let root = DataRoot::new(tmp.path());
    assert!(read_table_schema(&root, "9.9", "2024").is_err());
}

#[test]
fn table_catalog_keeps_only_table_rows() {
    let tmp = TempDir::new().unwrap();
    let listing = tmp.path().join("tables.csv");
    fs::write(
        &listing,
        "1;Раздел;Образование\n1.1;Таблица;Организации\n2.5.1;Таблица;Кадры\n;;\n",
    )
    .unwrap();

    let catalog = TableCatalog::load(&listing).unwrap();
    assert_eq!(catalog.tables.len(), 2);
    assert_eq!(catalog.name_of("2.5.1"), Some("Кадры"));
    assert!(catalog.prompt_listing().contains("1.1: Организации"));
}
