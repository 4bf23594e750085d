//! Config merge and generation

use toml::Value;

use gemix::config::generate::{default_template, gen_confs, HOST_CONF_NAME};
use gemix::config::merge::{get_path, merge_to_toml};
use gemix::config::{flatten_map, fold_map, merge_config, ConfigMap};
use gemix::topology::Specification;

use crate::mock::TOPOLOGY;

fn table(src: &str) -> ConfigMap {
    src.parse().unwrap()
}

#[test]
fn test_fold_inverts_flatten() {
    let conf = table(
        r#"
[common]
meta-join = ["10.0.0.1:8092", "10.0.0.2:8092"]
[data]
store-data-dir = "/data"
[data.cache]
size = 64
[empty]
"#,
    );
    assert_eq!(fold_map(&flatten_map(&conf)), conf);
}

#[test]
fn test_merge_patches_leaves() {
    let base = table("[a]\nb = 1\nc = 2\n");
    let overlay = table("[a]\nb = 3\nd = 4\n");
    assert_eq!(
        merge_config(&base, &[&overlay]),
        table("[a]\nb = 3\nc = 2\nd = 4\n")
    );
}

#[test]
fn test_merge_accepts_flat_overlays() {
    let base = table("[data]\nstore-data-dir = \"/a\"\nstore-wal-dir = \"/a/wal\"\n");
    let mut overlay = ConfigMap::new();
    overlay.insert("data.store-data-dir".to_string(), Value::from("/b"));

    let merged = merge_config(&base, &[&overlay]);
    assert_eq!(get_path(&merged, "data.store-data-dir"), Some(&Value::from("/b")));
    assert_eq!(get_path(&merged, "data.store-wal-dir"), Some(&Value::from("/a/wal")));
}

#[test]
fn test_merge_to_toml_has_banner_and_parses() {
    let doc = merge_to_toml(&table("[a]\nb = 1\n"), &[&table("[a]\nc = 2\n")]).unwrap();
    assert!(doc.starts_with('#'));
    let parsed: ConfigMap = doc.parse().unwrap();
    assert_eq!(parsed, table("[a]\nb = 1\nc = 2\n"));
}

#[test]
fn test_gen_confs_one_file_per_host() {
    let topology = Specification::from_yaml(TOPOLOGY).unwrap();
    let confs = gen_confs(&topology, &default_template().unwrap()).unwrap();
    assert_eq!(confs.len(), 3);

    let meta = &confs["10.0.0.1"];
    assert_eq!(
        get_path(meta, "meta.http-bind-address"),
        Some(&Value::from("10.0.0.1:8091"))
    );
    assert_eq!(
        get_path(meta, "meta.dir"),
        Some(&Value::from("/data/gemini/meta"))
    );
    assert!(get_path(meta, "data")
        .and_then(Value::as_table)
        .is_some_and(|t| t.is_empty()));

    let store = &confs["10.0.0.2"];
    assert!(get_path(store, "meta.dir").is_none());
    assert_eq!(
        get_path(store, "data.store-ingest-addr"),
        Some(&Value::from("10.0.0.2:8400"))
    );

    let sql = &confs["10.0.0.3"];
    assert_eq!(
        get_path(sql, "http.bind-address"),
        Some(&Value::from("10.0.0.3:8086"))
    );
    for conf in confs.values() {
        assert_eq!(
            get_path(conf, "common.meta-join"),
            Some(&Value::Array(vec![Value::from("10.0.0.1:8092")]))
        );
    }
    assert_eq!(HOST_CONF_NAME, "openGemini.conf");
}

#[test]
fn test_gen_confs_honours_explicit_ports() {
    let topology = Specification::from_yaml(
        "ts-meta:\n  - host: 10.0.0.1\n    peer_port: 9092\n    client_port: 9091\n",
    )
    .unwrap();
    let confs = gen_confs(&topology, &default_template().unwrap()).unwrap();
    let meta = &confs["10.0.0.1"];
    assert_eq!(
        get_path(meta, "meta.http-bind-address"),
        Some(&Value::from("10.0.0.1:9091"))
    );
    assert_eq!(
        get_path(meta, "common.meta-join"),
        Some(&Value::Array(vec![Value::from("10.0.0.1:9092")]))
    );
}
