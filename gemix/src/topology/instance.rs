//! Concrete instances derived from role specs

use std::sync::Arc;

use toml::Value;

use crate::config::merge::set_path;
use crate::config::ConfigMap;
use crate::topology::spec::{InstancePorts, Role, RoleSpec, Specification};
use crate::utils::abs_path;

/// A store advertises its meta gossip port one above its own gossip port
pub const STORE_META_GOSSIP_OFFSET: u16 = 1;

/// A meta advertises its store gossip port one below its own gossip port
pub const META_STORE_GOSSIP_OFFSET: u16 = 1;

/// Database ts-monitor reports into
pub const MONITOR_REPORT_DATABASE: &str = "_internal";

/// Addresses every instance needs to know about the rest of the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPeers {
    /// `host:peer_port` of every meta instance
    pub meta_join: Vec<String>,
    /// `host:gossip_port` of every meta instance
    pub gossip_members: Vec<String>,
    /// `host:http_port` of every sql instance
    pub sql_addrs: Vec<String>,
}

impl ClusterPeers {
    pub fn from_topology(topology: &Specification) -> Self {
        let mut peers = ClusterPeers::default();
        for spec in topology.role_specs() {
            match spec.ports() {
                InstancePorts::Meta { peer, gossip, .. } => {
                    peers.meta_join.push(format!("{}:{}", spec.host(), peer));
                    peers.gossip_members.push(format!("{}:{}", spec.host(), gossip));
                }
                InstancePorts::Sql { http } => {
                    peers.sql_addrs.push(format!("{}:{}", spec.host(), http));
                }
                _ => {}
            }
        }
        peers
    }
}

/// One process of the cluster.
///
/// Built fresh from the topology whenever it is needed and never mutated.
#[derive(Debug, Clone)]
pub struct Instance {
    pub role: Role,
    pub host: String,
    pub ssh_port: u16,
    pub user: String,
    pub ports: InstancePorts,
    pub deploy_dir: String,
    pub data_dir: String,
    pub log_dir: String,
    pub os: String,
    pub arch: String,
    /// Per-instance overrides from the topology file
    pub config: ConfigMap,
    peers: Arc<ClusterPeers>,
}

impl Instance {
    pub fn new(spec: &dyn RoleSpec, topology: &Specification, peers: Arc<ClusterPeers>) -> Self {
        let global = &topology.global;
        let deploy_dir = spec.deploy_dir().unwrap_or(global.deploy_dir.as_str()).to_string();
        let data_dir = abs_path(&deploy_dir, spec.data_dir().unwrap_or(global.data_dir.as_str()));
        let log_dir = abs_path(&deploy_dir, spec.log_dir().unwrap_or(global.log_dir.as_str()));

        Self {
            role: spec.role(),
            host: spec.host().to_string(),
            ssh_port: spec.ssh_port().unwrap_or(global.ssh_port),
            user: global.user.clone(),
            ports: spec.ports(),
            deploy_dir,
            data_dir,
            log_dir,
            os: spec.os().unwrap_or(global.os.as_str()).to_string(),
            arch: spec.arch().unwrap_or(global.arch.as_str()).to_string(),
            config: spec.config().clone(),
            peers,
        }
    }

    pub fn component_name(&self) -> &'static str {
        self.role.name()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn used_ports(&self) -> Vec<u16> {
        self.ports.used()
    }

    pub fn used_dirs(&self) -> Vec<String> {
        vec![
            self.deploy_dir.clone(),
            self.data_dir.clone(),
            self.log_dir.clone(),
        ]
    }

    /// `host:port` of the main port, or `host/component` for port-less roles
    pub fn id(&self) -> String {
        match self.ports.main() {
            Some(port) => format!("{}:{}", self.host, port),
            None => format!("{}/{}", self.host, self.component_name()),
        }
    }

    /// Versioned directory holding binaries, configs and scripts
    pub fn install_root(&self, version: &str) -> String {
        format!("{}/{}", self.deploy_dir.trim_end_matches('/'), version)
    }

    pub fn bin_path(&self, version: &str) -> String {
        format!("{}/bin/{}", self.install_root(version), self.component_name())
    }

    pub fn conf_path(&self, version: &str) -> String {
        format!("{}/etc/{}", self.install_root(version), self.conf_file_name())
    }

    pub fn conf_file_name(&self) -> String {
        match self.ports.main() {
            Some(port) => format!("{}-{}.conf", self.component_name(), port),
            None => format!("{}.conf", self.component_name()),
        }
    }

    pub fn pid_path(&self, version: &str) -> String {
        match self.ports.main() {
            Some(port) => format!(
                "{}/pid/{}-{}.pid",
                self.install_root(version),
                self.component_name(),
                port
            ),
            None => format!("{}/pid/{}.pid", self.install_root(version), self.component_name()),
        }
    }

    pub fn extra_log_path(&self) -> String {
        format!("{}/{}_extra.log", self.log_dir, self.component_name())
    }

    fn addr(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }

    fn addr_list(addrs: &[String]) -> Value {
        Value::Array(addrs.iter().cloned().map(Value::String).collect())
    }

    /// Address bindings and peer lists this instance needs regardless of
    /// what the user configured
    pub fn default_config(&self) -> ConfigMap {
        let mut conf = ConfigMap::new();
        match self.ports {
            InstancePorts::Meta {
                client,
                peer,
                raft,
                gossip,
            } => {
                set_path(&mut conf, "common.meta-join", Self::addr_list(&self.peers.meta_join));
                set_path(&mut conf, "meta.bind-address", self.addr(raft));
                set_path(&mut conf, "meta.http-bind-address", self.addr(client));
                set_path(&mut conf, "meta.rpc-bind-address", self.addr(peer));
                set_path(&mut conf, "meta.dir", format!("{}/meta", self.data_dir));
                set_path(&mut conf, "logging.path", self.log_dir.clone());
                set_path(&mut conf, "gossip.bind-address", self.host.clone());
                set_path(&mut conf, "gossip.meta-bind-port", i64::from(gossip));
                set_path(
                    &mut conf,
                    "gossip.store-bind-port",
                    i64::from(gossip.saturating_sub(META_STORE_GOSSIP_OFFSET)),
                );
                set_path(
                    &mut conf,
                    "gossip.members",
                    Self::addr_list(&self.peers.gossip_members),
                );
            }
            InstancePorts::Sql { http } => {
                set_path(&mut conf, "common.meta-join", Self::addr_list(&self.peers.meta_join));
                set_path(&mut conf, "http.bind-address", self.addr(http));
                set_path(&mut conf, "logging.path", self.log_dir.clone());
            }
            InstancePorts::Store {
                ingest,
                select,
                gossip,
            } => {
                set_path(&mut conf, "common.meta-join", Self::addr_list(&self.peers.meta_join));
                set_path(&mut conf, "data.store-ingest-addr", self.addr(ingest));
                set_path(&mut conf, "data.store-select-addr", self.addr(select));
                set_path(&mut conf, "data.store-data-dir", self.data_dir.clone());
                set_path(&mut conf, "data.store-wal-dir", format!("{}/wal", self.data_dir));
                set_path(&mut conf, "data.store-meta-dir", format!("{}/meta", self.data_dir));
                set_path(&mut conf, "logging.path", self.log_dir.clone());
                set_path(&mut conf, "gossip.bind-address", self.host.clone());
                set_path(&mut conf, "gossip.store-bind-port", i64::from(gossip));
                set_path(
                    &mut conf,
                    "gossip.meta-bind-port",
                    i64::from(gossip.saturating_add(STORE_META_GOSSIP_OFFSET)),
                );
                set_path(
                    &mut conf,
                    "gossip.members",
                    Self::addr_list(&self.peers.gossip_members),
                );
            }
            InstancePorts::Monitor => {
                set_path(&mut conf, "monitor.host", self.host.clone());
                set_path(&mut conf, "monitor.metric-path", format!("{}/metric", self.log_dir));
                set_path(&mut conf, "monitor.error-log-path", format!("{}/metric", self.log_dir));
                set_path(&mut conf, "monitor.process", "ts-meta,ts-sql,ts-store");
                if let Some(sql) = self.peers.sql_addrs.first() {
                    set_path(&mut conf, "report.address", sql.clone());
                }
                set_path(&mut conf, "report.database", MONITOR_REPORT_DATABASE);
            }
            InstancePorts::Grafana { .. } => {}
        }
        conf
    }
}
