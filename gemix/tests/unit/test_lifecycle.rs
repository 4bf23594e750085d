//! Lifecycle operations driven against simulated hosts

use std::sync::Arc;

use gemix::errors::GemixError;
use gemix::operation::{ClusterManager, InstallRequest};
use gemix::storage::cluster::ClusterAuth;

use crate::mock::{manager, test_options, HostState, MockConnector, TOPOLOGY};

const VERSION: &str = "1.2.0";

fn request(name: &str) -> InstallRequest {
    InstallRequest {
        name: name.to_string(),
        version: VERSION.to_string(),
        user: "root".to_string(),
        auth: ClusterAuth::Key {
            path: "/root/.ssh/id_rsa".to_string(),
        },
        topology_yaml: TOPOLOGY.to_string(),
    }
}

async fn installed(connector: Arc<MockConnector>, name: &str) -> ClusterManager {
    let manager = manager(test_options(VERSION).await, connector);
    manager.install(request(name)).await.unwrap();
    manager
}

fn position(commands: &[(String, String)], needle: &str) -> Option<usize> {
    commands.iter().position(|(_, cmd)| cmd.contains(needle))
}

#[tokio::test]
async fn test_install_uploads_everything() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;

    let layout = &manager.options().layout;
    assert!(layout.cluster_meta_file("c1").exists().await);
    assert!(layout.cluster_dir("c1").file("topology.yaml").exists().await);
    for host in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        assert!(layout
            .staging_dir("c1")
            .subdir(host)
            .file("openGemini.conf")
            .exists()
            .await);
    }

    let meta_host = connector.state("10.0.0.1").uploaded();
    for path in [
        "/opt/gemini/1.2.0/bin/ts-meta",
        "/opt/gemini/1.2.0/scripts/install.sh",
        "/opt/gemini/1.2.0/etc/openGemini.conf",
        "/opt/gemini/1.2.0/etc/ts-meta-8091.conf",
    ] {
        assert!(meta_host.iter().any(|p| p == path), "missing upload {}", path);
    }
    assert!(!meta_host.iter().any(|p| p.ends_with("/ts-store")));

    let store_host = connector.state("10.0.0.2").uploaded();
    assert!(store_host.iter().any(|p| p == "/opt/gemini/1.2.0/bin/ts-store"));
    assert!(store_host.iter().any(|p| p == "/opt/gemini/1.2.0/etc/ts-store-8400.conf"));
}

#[tokio::test]
async fn test_install_rejects_existing_cluster() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector, "c1").await;

    let err = manager.install(request("c1")).await.unwrap_err();
    assert!(matches!(err, GemixError::ValidationError(_)));
}

#[tokio::test]
async fn test_install_rejects_bad_name() {
    let connector = Arc::new(MockConnector::new());
    let manager = manager(test_options(VERSION).await, connector.clone());

    let err = manager.install(request("bad/name")).await.unwrap_err();
    assert!(matches!(err, GemixError::ValidationError(_)));
    assert!(connector.commands().is_empty());
}

#[tokio::test]
async fn test_install_aborts_on_unreachable_host() {
    let connector = Arc::new(MockConnector::new().unreachable("10.0.0.3"));
    let manager = manager(test_options(VERSION).await, connector.clone());

    let err = manager.install(request("c1")).await.unwrap_err();
    assert!(matches!(err, GemixError::ConnectionError(_)));
    assert!(position(&connector.commands(), "mkdir").is_none());
    assert!(!manager.options().layout.cluster_meta_file("c1").exists().await);
}

#[tokio::test]
async fn test_start_launches_meta_first() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    connector.clear();

    manager.start("c1").await.unwrap();

    let commands = connector.commands();
    let meta = position(&commands, "install.sh ts-meta").unwrap();
    let store = position(&commands, "install.sh ts-store").unwrap();
    let sql = position(&commands, "install.sh ts-sql").unwrap();
    assert!(meta < store);
    assert!(meta < sql);

    // readiness probe on the meta client port sits between the two stages
    let probe = commands
        .iter()
        .enumerate()
        .skip(meta)
        .find(|(_, (host, cmd))| host == "10.0.0.1" && cmd.contains(":8091$"))
        .map(|(i, _)| i)
        .unwrap();
    assert!(probe < store);
}

#[tokio::test]
async fn test_start_port_conflict_launches_nothing() {
    let connector = Arc::new(MockConnector::new().with_host(
        "10.0.0.1",
        HostState::busy(8091),
    ));
    let manager = installed(connector.clone(), "c1").await;
    connector.clear();

    let err = manager.start("c1").await.unwrap_err();
    match err {
        GemixError::ConflictError(msg) => {
            assert!(msg.contains("8091"));
            assert!(msg.contains("10.0.0.1"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(position(&connector.commands(), "bash ").is_none());
}

#[tokio::test]
async fn test_start_failure_on_one_host_does_not_stop_others() {
    let connector = Arc::new(MockConnector::new().with_host(
        "10.0.0.2",
        HostState::failing_launch(),
    ));
    let manager = installed(connector.clone(), "c1").await;
    connector.clear();

    let err = manager.start("c1").await.unwrap_err();
    assert!(matches!(err, GemixError::OperationFailed(ref op) if op == "start"));
    assert!(position(&connector.commands(), "install.sh ts-sql").is_some());
}

const TWO_META_TOPOLOGY: &str = r#"
global:
  user: root
  deploy_dir: /opt/gemini
  log_dir: /var/log/gemini
  data_dir: /data/gemini
ts-meta:
  - host: 10.0.0.1
  - host: 10.0.0.4
ts-store:
  - host: 10.0.0.2
ts-sql:
  - host: 10.0.0.3
"#;

#[tokio::test]
async fn test_start_meta_failure_still_launches_store_and_sql() {
    let connector = Arc::new(MockConnector::new().with_host("10.0.0.4", HostState::failing_launch()));
    let manager = manager(test_options(VERSION).await, connector.clone());
    manager
        .install(InstallRequest {
            topology_yaml: TWO_META_TOPOLOGY.to_string(),
            ..request("c2")
        })
        .await
        .unwrap();
    connector.clear();

    let err = manager.start("c2").await.unwrap_err();
    assert!(matches!(err, GemixError::OperationFailed(ref op) if op == "start"));

    let commands = connector.commands();
    let launched_on = |needle: &str| -> Vec<String> {
        commands
            .iter()
            .filter(|(_, cmd)| cmd.contains(needle))
            .map(|(host, _)| host.clone())
            .collect()
    };
    assert_eq!(launched_on("install.sh ts-meta").len(), 2);
    assert_eq!(launched_on("install.sh ts-store"), vec!["10.0.0.2".to_string()]);
    assert_eq!(launched_on("install.sh ts-sql"), vec!["10.0.0.3".to_string()]);
    // the healthy meta was still polled for readiness
    assert!(commands
        .iter()
        .any(|(host, cmd)| host == "10.0.0.1" && cmd.contains(":8091$")));
}

#[tokio::test]
async fn test_stop_kills_running_processes() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    manager.start("c1").await.unwrap();
    connector.clear();

    manager.stop("c1").await.unwrap();

    let commands = connector.commands();
    for host in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
        let on_host: Vec<&str> = commands
            .iter()
            .filter(|(h, _)| h == host)
            .map(|(_, c)| c.as_str())
            .collect();
        assert!(on_host.contains(&"killall ts-meta"), "no kill on {}", host);
        let sql = on_host.iter().position(|c| *c == "killall ts-sql").unwrap();
        let meta = on_host.iter().position(|c| *c == "killall ts-meta").unwrap();
        assert!(sql < meta);
    }
}

#[tokio::test]
async fn test_stop_without_processes_succeeds() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    connector.clear();

    manager.stop("c1").await.unwrap();
    assert!(position(&connector.commands(), "killall").is_none());
}

#[tokio::test]
async fn test_status_reports_every_host() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    manager.start("c1").await.unwrap();

    let statuses = manager.status("c1").await.unwrap();
    let hosts: Vec<&str> = statuses.iter().map(|s| s.host.as_str()).collect();
    assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.3", "10.0.0.2"]);

    let meta = &statuses[0];
    assert_eq!(meta.processes, vec!["ts-meta"]);
    assert!(meta.ports.iter().all(|p| p.listening));
    assert_eq!(meta.ports.len(), 4);
    assert_eq!(meta.disk.len(), 1);
}

#[tokio::test]
async fn test_uninstall_removes_remote_and_local_state() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    connector.clear();

    manager.uninstall("c1").await.unwrap();

    let removals: Vec<_> = connector
        .commands()
        .into_iter()
        .filter(|(_, cmd)| cmd.starts_with("rm -rf"))
        .collect();
    assert_eq!(removals.len(), 3);
    assert!(removals.iter().all(|(_, cmd)| cmd == "rm -rf /opt/gemini/1.2.0"));

    let layout = &manager.options().layout;
    assert!(!layout.cluster_dir("c1").exists().await);
    assert!(!layout.staging_dir("c1").exists().await);
    assert!(matches!(
        manager.start("c1").await,
        Err(GemixError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_upgrade_reinstalls_new_version() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector.clone(), "c1").await;
    manager
        .options()
        .layout
        .package_dir("1.3.0", "linux", "amd64")
        .subdir("usr")
        .subdir("bin")
        .create()
        .await
        .unwrap();

    let fsm = manager.upgrade("c1", "1.3.0").await.unwrap();
    assert_eq!(fsm.state(), gemix::operation::fsm::ClusterState::Running);

    let commands = connector.commands();
    let removed = position(&commands, "rm -rf /opt/gemini/1.2.0").unwrap();
    let launched = position(&commands, "/opt/gemini/1.3.0/scripts/install.sh ts-meta").unwrap();
    assert!(removed < launched);

    let cluster = gemix::operation::Cluster::load(&manager.options().layout, "c1")
        .await
        .unwrap();
    assert_eq!(cluster.version(), "1.3.0");
}

#[tokio::test]
async fn test_upgrade_to_same_version_is_rejected() {
    let connector = Arc::new(MockConnector::new());
    let manager = installed(connector, "c1").await;

    let err = manager.upgrade("c1", "v1.2.0").await.unwrap_err();
    assert!(matches!(err, GemixError::ValidationError(_)));
}
