use std::fs;

use tempfile::tempdir;

use shipbatch::config::Config;

#[test]
fn config_loads_and_sorts_rules() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "defaults": {"service": "Priority"},
            "rules": [
                {"max_items": 9999, "weight_oz": 1, "machinable": true, "predefined_package": "Package"},
                {"max_items": 7, "weight_oz": 1, "machinable": true, "predefined_package": "Letter"}
            ],
            "detection": {"manapool_shipping_equals_package": [0, 2.5]}
        }"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();

    // Field-level merge over defaults: service overridden, carrier kept.
    assert_eq!(config.defaults.service, "Priority");
    assert_eq!(config.defaults.carrier, "USPS");
    assert_eq!(config.defaults.label_format, "PNG");

    // Rules sorted ascending by threshold regardless of file order.
    let thresholds: Vec<u32> = config.rules.iter().map(|r| r.max_items).collect();
    assert_eq!(thresholds, vec![7, 9999]);

    // The original config key for detection still works.
    assert!(config.detection.price_means_package(2.5));
    assert!(!config.detection.price_means_package(4.99));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config.rules.len(), 5);
    assert_eq!(config.rules.last().unwrap().max_items, 9999);
    assert!(config.rules.last().unwrap().promotes_to_package());
}

#[test]
fn empty_rule_list_is_replaced_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"rules": []}"#).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.rules.len(), 5);
}

#[test]
fn config_round_trips_through_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.defaults.service = "Priority".to_string();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.defaults.service, "Priority");
    assert_eq!(loaded.rules.len(), config.rules.len());
}
