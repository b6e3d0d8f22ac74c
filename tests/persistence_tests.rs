//! Integration tests for saving configuration and reading it back.

use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tweak::{Config, ConfigOptions, ConfigPaths, Format, Value};

fn user_only(temp: &TempDir, format: Format) -> ConfigPaths {
    let file = format!("config.{}", format.extension());
    ConfigPaths::with_files(None, temp.path().join("app").join(file), Vec::new())
}

fn sample_tree(config: &mut Config) {
    config.set("host", "example.com").unwrap();
    config.set("port", 9000).unwrap();
    config.set("ratio", 0.5).unwrap();
    config.set("token", Value::Null).unwrap();
    config.set_path("nested_config.foo", true).unwrap();
    config
        .set_path("nested_config.paths", vec!["/a", "/b"])
        .unwrap();
    config
        .set("mixed", Value::from(json!([1, "two", {"three": [3]}, null])))
        .unwrap();
}

fn round_trip(format: Format) {
    let temp = TempDir::new().unwrap();
    let options = ConfigOptions::default()
        .with_format(format)
        .with_save_on_exit(false);

    let mut original = Config::with_paths("app", options, user_only(&temp, format)).unwrap();
    sample_tree(&mut original);
    assert!(original.save().unwrap());

    let reloaded = Config::with_paths("app", options, user_only(&temp, format)).unwrap();
    assert!(reloaded.issues().is_empty());
    assert_eq!(reloaded.root(), original.root());
    assert_eq!(
        reloaded.keys().collect::<Vec<_>>(),
        vec!["host", "port", "ratio", "token", "nested_config", "mixed"]
    );
}

#[test]
fn json_round_trip() {
    round_trip(Format::Json);
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_round_trip() {
    round_trip(Format::Yaml);
}

#[test]
fn second_save_without_changes_is_skipped() {
    let temp = TempDir::new().unwrap();
    let options = ConfigOptions::default().with_save_on_exit(false);
    let mut config = Config::with_paths("app", options, user_only(&temp, Format::Json)).unwrap();
    config.set("a", 1).unwrap();

    assert!(config.save().unwrap());
    assert!(!config.save().unwrap());

    config.set("a", 2).unwrap();
    assert!(config.save().unwrap());
}

#[test]
fn reopened_config_does_not_rewrite_identical_file() {
    let temp = TempDir::new().unwrap();
    let options = ConfigOptions::default().with_save_on_exit(false);
    let mut config = Config::with_paths("app", options, user_only(&temp, Format::Json)).unwrap();
    config.set_path("server.port", 8080).unwrap();
    config.save().unwrap();

    let reopened = Config::with_paths("app", options, user_only(&temp, Format::Json)).unwrap();
    assert!(!reopened.save().unwrap());
}

#[test]
fn save_writes_only_the_user_file() {
    let temp = TempDir::new().unwrap();
    let site = temp.path().join("site/config.json");
    fs::create_dir_all(site.parent().unwrap()).unwrap();
    fs::write(&site, r#"{"from_site": true}"#).unwrap();
    let user: PathBuf = temp.path().join("user/config.json");

    let paths = ConfigPaths::with_files(Some(site.clone()), user.clone(), Vec::new());
    let mut config = Config::with_paths("app", ConfigOptions::default(), paths).unwrap();
    config.set("from_user", true).unwrap();
    config.close().unwrap();

    assert_eq!(fs::read_to_string(&site).unwrap(), r#"{"from_site": true}"#);
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&user).unwrap()).unwrap();
    // The merged tree is persisted, including values inherited from the site file
    assert_eq!(saved, json!({"from_site": true, "from_user": true}));
}

#[test]
fn removing_keys_persists() {
    let temp = TempDir::new().unwrap();
    let options = ConfigOptions::default().with_autosave(true).with_save_on_exit(false);
    let mut config = Config::with_paths("app", options, user_only(&temp, Format::Json)).unwrap();
    config.set("keep", 1).unwrap();
    config.set("drop", 2).unwrap();
    config.remove("drop").unwrap();

    let reloaded = Config::with_paths("app", options, user_only(&temp, Format::Json)).unwrap();
    assert_eq!(reloaded.root(), &json!({"keep": 1}));
}
