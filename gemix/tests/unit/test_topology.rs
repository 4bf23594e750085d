//! Topology model, ordering and default configs

use toml::Value;

use gemix::config::merge::get_path;
use gemix::errors::GemixError;
use gemix::topology::{Role, Specification};

use crate::mock::TOPOLOGY;

#[test]
fn test_start_and_stop_order() {
    let topology = Specification::from_yaml(TOPOLOGY).unwrap();

    let start: Vec<Role> = topology
        .components_by_start_order()
        .iter()
        .map(|c| c.role())
        .collect();
    assert_eq!(start[0], Role::TsMeta);

    let stop: Vec<Role> = topology
        .components_by_stop_order()
        .iter()
        .map(|c| c.role())
        .collect();
    assert_eq!(stop.last(), Some(&Role::TsMeta));
    assert_eq!(stop.len(), 3);
}

#[test]
fn test_meta_default_config_single_meta() {
    let topology = Specification::from_yaml(TOPOLOGY).unwrap();
    let meta = topology.instances_of(Role::TsMeta).remove(0);
    let conf = meta.default_config();

    assert_eq!(
        get_path(&conf, "meta.http-bind-address"),
        Some(&Value::from("10.0.0.1:8091"))
    );
    assert_eq!(
        get_path(&conf, "common.meta-join"),
        Some(&Value::Array(vec![Value::from("10.0.0.1:8092")]))
    );
}

#[test]
fn test_store_default_config_lists_every_meta_peer() {
    let topology = Specification::from_yaml(
        "ts-meta:\n  - host: 10.0.0.1\n  - host: 10.0.0.2\n  - host: 10.0.0.3\nts-store:\n  - host: 10.0.0.4\n",
    )
    .unwrap();
    let store = topology.instances_of(Role::TsStore).remove(0);
    let conf = store.default_config();

    let join = get_path(&conf, "common.meta-join")
        .and_then(Value::as_array)
        .unwrap();
    assert_eq!(join.len(), 3);
    let members = get_path(&conf, "gossip.members")
        .and_then(Value::as_array)
        .unwrap();
    assert_eq!(members[2], Value::from("10.0.0.3:8010"));
}

#[test]
fn test_instance_paths_resolve_against_deploy_dir() {
    let topology = Specification::from_yaml(
        "global:\n  deploy_dir: /opt/gemini\nts-sql:\n  - host: 10.0.0.1\n    log_dir: logs\nts-meta:\n  - host: 10.0.0.1\n",
    )
    .unwrap();
    let sql = topology.instances_of(Role::TsSql).remove(0);
    assert_eq!(sql.log_dir, "/opt/gemini/logs");
    assert_eq!(sql.conf_path("1.2.0"), "/opt/gemini/1.2.0/etc/ts-sql-8086.conf");
    assert_eq!(sql.id(), "10.0.0.1:8086");
}

#[test]
fn test_validation_rejects_port_clash() {
    let topology = Specification::from_yaml(
        "ts-meta:\n  - host: 10.0.0.1\nts-sql:\n  - host: 10.0.0.1\n    port: 8091\n",
    )
    .unwrap();
    assert!(matches!(
        topology.validate(),
        Err(GemixError::ValidationError(_))
    ));
}

#[test]
fn test_validation_requires_meta() {
    let topology = Specification::from_yaml("ts-sql:\n  - host: 10.0.0.1\n").unwrap();
    assert!(matches!(
        topology.validate(),
        Err(GemixError::ValidationError(_))
    ));
}

#[test]
fn test_colocated_meta_and_store_share_the_stock_meta_dir() {
    let topology = Specification::from_yaml(
        r#"
global:
  data_dir: /data/gemini
ts-meta:
  - host: 10.0.0.1
ts-store:
  - host: 10.0.0.1
"#,
    )
    .unwrap();
    topology.validate().unwrap();

    let meta = topology.instances_of(Role::TsMeta).remove(0).default_config();
    let store = topology.instances_of(Role::TsStore).remove(0).default_config();
    assert_eq!(get_path(&meta, "meta.dir"), Some(&Value::from("/data/gemini/meta")));
    assert_eq!(
        get_path(&store, "data.store-meta-dir"),
        Some(&Value::from("/data/gemini/meta"))
    );
    assert_eq!(
        get_path(&store, "data.store-wal-dir"),
        Some(&Value::from("/data/gemini/wal"))
    );
}
