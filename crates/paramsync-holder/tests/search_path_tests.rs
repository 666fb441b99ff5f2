//! Integration tests for loading operations from a search path.
//!
//! Fixtures are written into temporary directories laid out as
//! `<dir>/<class>/<class>-<version>.json`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use paramsync_core::Value;
use paramsync_holder::{
    ClassLoader, HolderError, LoadError, OpHolder, SearchPathClassLoader, LATEST_VERSION,
    OP_PATHS_ENV_VAR,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn write_class(dir: &Path, class_name: &str, version: i64, json: &str) {
    let class_dir = dir.join(class_name);
    fs::create_dir_all(&class_dir).unwrap();
    fs::write(class_dir.join(format!("{}-{}.json", class_name, version)), json).unwrap();
}

fn gain(default: f64) -> String {
    format!(
        r#"{{
            "description": "multiplies a signal",
            "result": "gain",
            "parameters": [
                {{ "name": "gain", "type": "float", "default": {}, "range": {{ "min": 0.0, "max": 10.0 }} }},
                {{ "name": "mode", "type": "compound", "children": [
                    {{ "name": "label", "type": "string", "default": "linear" }}
                ] }}
            ]
        }}"#,
        default
    )
}

fn fixture() -> (TempDir, TempDir) {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    write_class(first.path(), "gain", 1, &gain(1.0));
    write_class(first.path(), "gain", 3, &gain(3.0));
    write_class(second.path(), "gain", 7, &gain(7.0));
    write_class(
        second.path(),
        "settings",
        1,
        r#"{ "kind": "procedure", "parameters": [ { "name": "verbose", "type": "bool", "default": false } ] }"#,
    );
    (first, second)
}

fn loader(first: &TempDir, second: &TempDir) -> SearchPathClassLoader {
    SearchPathClassLoader::new().with_search_path(
        OP_PATHS_ENV_VAR,
        vec![first.path().to_path_buf(), second.path().to_path_buf()],
    )
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[test]
fn lists_classes_and_versions() {
    let (first, second) = fixture();
    let loader = loader(&first, &second);

    assert_eq!(
        loader.classes(OP_PATHS_ENV_VAR).unwrap(),
        vec!["gain".to_string(), "settings".to_string()]
    );
    // The first directory holding a class shadows later ones.
    assert_eq!(loader.versions("gain", OP_PATHS_ENV_VAR).unwrap(), vec![1, 3]);
}

#[test]
fn latest_version_is_highest_in_first_directory() {
    let (first, second) = fixture();
    let loader = loader(&first, &second);

    let (version, definition) = loader
        .definition("gain", LATEST_VERSION, OP_PATHS_ENV_VAR)
        .unwrap();
    assert_eq!(version, 3);
    assert_eq!(definition.description, "multiplies a signal");

    let loaded = loader.load("gain", 1, OP_PATHS_ENV_VAR).unwrap();
    let parameterised = loaded.into_parameterised().unwrap();
    assert_eq!(
        parameterised.parameters().descendant("gain").unwrap().value(),
        Some(&Value::Float(1.0))
    );
}

#[test]
fn missing_class_and_version_are_reported() {
    let (first, second) = fixture();
    let loader = loader(&first, &second);

    assert!(matches!(
        loader.load("blur", 1, OP_PATHS_ENV_VAR),
        Err(LoadError::ClassNotFound { .. })
    ));
    match loader.load("gain", 2, OP_PATHS_ENV_VAR) {
        Err(LoadError::VersionNotFound { available, .. }) => assert_eq!(available, vec![1, 3]),
        other => panic!("expected VersionNotFound, got {:?}", other),
    }
}

#[test]
fn malformed_definitions_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "broken", 1, "{ \"parameters\": ");
    write_class(
        dir.path(),
        "noresult",
        1,
        r#"{ "parameters": [ { "name": "x", "type": "int", "default": 1 } ] }"#,
    );
    let loader =
        SearchPathClassLoader::new().with_search_path("P", vec![dir.path().to_path_buf()]);

    assert!(matches!(
        loader.load("broken", 1, "P"),
        Err(LoadError::Parse { .. })
    ));
    assert!(matches!(
        loader.load("noresult", 1, "P"),
        Err(LoadError::InvalidDefinition { .. })
    ));
}

#[test]
fn unrelated_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "gain", 2, &gain(2.0));
    let class_dir = dir.path().join("gain");
    fs::write(class_dir.join("README.txt"), "notes").unwrap();
    fs::write(class_dir.join("gain-draft.json"), "{}").unwrap();
    fs::write(class_dir.join("other-5.json"), "{}").unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();

    let loader =
        SearchPathClassLoader::new().with_search_path("P", vec![dir.path().to_path_buf()]);
    assert_eq!(loader.versions("gain", "P").unwrap(), vec![2]);
    assert_eq!(loader.classes("P").unwrap(), vec!["gain".to_string()]);
}

// ---------------------------------------------------------------------------
// Holder integration
// ---------------------------------------------------------------------------

#[test]
fn op_holder_loads_and_reloads_from_disk() {
    let (first, second) = fixture();
    let mut holder = OpHolder::new("gain1")
        .unwrap()
        .with_loader(Arc::new(loader(&first, &second)));

    holder.set_op("gain", 1, false).unwrap();
    holder.set_parameter_plug("gain", Value::Float(25.0)).unwrap();
    // Clamped into the declared range.
    assert_eq!(holder.compute().unwrap(), Value::Float(10.0));

    // A new version on disk picked up by a reload at the latest version.
    write_class(first.path(), "gain", 4, &gain(4.0));
    holder.set_op("gain", LATEST_VERSION, true).unwrap();
    assert_eq!(holder.compute().unwrap(), Value::Float(10.0));
    holder.set_op("gain", LATEST_VERSION, false).unwrap();
    assert_eq!(holder.compute().unwrap(), Value::Float(4.0));
}

#[test]
fn procedures_cannot_be_set_as_ops() {
    let (first, second) = fixture();
    let mut holder = OpHolder::new("op")
        .unwrap()
        .with_loader(Arc::new(loader(&first, &second)));
    assert!(matches!(
        holder.set_op("settings", 1, false),
        Err(HolderError::TypeMismatch { .. })
    ));
}
