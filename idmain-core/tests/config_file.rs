//! Configuration files and their effect on a database.

use idmain_core::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn config_round_trips_through_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idmain.json");
    let config = MainConfig::builder()
        .sort_chunk_size(8)
        .cascade_never_null_on_delete(false)
        .build()
        .unwrap();
    config.save(&path).unwrap();

    let loaded = MainConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn missing_fields_keep_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "notify_changes": false }"#).unwrap();

    let loaded = MainConfig::load(&path).unwrap();
    assert!(!loaded.notify_changes());
    assert!(loaded.cascade_never_null_on_delete());
    assert_eq!(loaded.sort_chunk_size(), MainConfig::default().sort_chunk_size());
}

#[test]
fn invalid_files_are_rejected() {
    let dir = tempdir().unwrap();
    let zero = dir.path().join("zero.json");
    std::fs::write(&zero, r#"{ "sort_chunk_size": 0 }"#).unwrap();
    assert_eq!(MainConfig::load(&zero).unwrap_err().code(), "E201");

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "not json").unwrap();
    assert_eq!(MainConfig::load(&garbage).unwrap_err().code(), "E901");

    let missing = dir.path().join("missing.json");
    assert_eq!(MainConfig::load(&missing).unwrap_err().code(), "E902");
}

#[test]
fn loaded_config_drives_deletion() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("idmain.json");
    std::fs::write(&path, r#"{ "cascade_never_null_on_delete": false }"#).unwrap();
    let config = MainConfig::load(&path).unwrap();

    let mut main = Main::with_config(Arc::new(SessionUidGenerator::new()), config);
    let mesh = main.new_id(IdType::Mesh, "Cube");
    let object = main.new_id(IdType::Object, "Cube");
    main.get_mut(object).unwrap().data.as_object_mut().unwrap().data = Some(mesh);
    main.refcount_recompute(false);

    assert_eq!(main.delete(mesh), 1);
    assert!(main.contains(object));
    assert_eq!(main.get(object).unwrap().data.as_object().unwrap().data, None);
}
