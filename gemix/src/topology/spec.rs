//! Topology description parsed from the user's YAML file

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::ConfigMap;
use crate::errors::GemixError;
use crate::filesys::file::File;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const META_CLIENT_PORT: u16 = 8091;
pub const META_PEER_PORT: u16 = 8092;
pub const META_RAFT_PORT: u16 = 8088;
pub const META_GOSSIP_PORT: u16 = 8010;
pub const SQL_PORT: u16 = 8086;
pub const STORE_INGEST_PORT: u16 = 8400;
pub const STORE_SELECT_PORT: u16 = 8401;
pub const STORE_GOSSIP_PORT: u16 = 8011;
pub const GRAFANA_PORT: u16 = 3000;

/// Cluster roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ts-meta")]
    TsMeta,
    #[serde(rename = "ts-sql")]
    TsSql,
    #[serde(rename = "ts-store")]
    TsStore,
    #[serde(rename = "ts-monitor")]
    TsMonitor,
    #[serde(rename = "grafana")]
    Grafana,
}

impl Role {
    /// Component name, also the process and binary name
    pub fn name(&self) -> &'static str {
        match self {
            Role::TsMeta => "ts-meta",
            Role::TsSql => "ts-sql",
            Role::TsStore => "ts-store",
            Role::TsMonitor => "ts-monitor",
            Role::Grafana => "grafana",
        }
    }

    /// Roles whose binaries ship in the openGemini package
    pub fn from_package(&self) -> bool {
        !matches!(self, Role::Grafana)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Options shared by every server unless overridden per server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalOptions {
    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default = "default_deploy_dir")]
    pub deploy_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_os")]
    pub os: String,

    #[serde(default = "default_arch")]
    pub arch: String,
}

fn default_user() -> String {
    "gemini".to_string()
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_deploy_dir() -> String {
    "/gemini-deploy".to_string()
}

fn default_log_dir() -> String {
    "/gemini-log".to_string()
}

fn default_data_dir() -> String {
    "/gemini-data".to_string()
}

fn default_os() -> String {
    "linux".to_string()
}

fn default_arch() -> String {
    "amd64".to_string()
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            user: default_user(),
            ssh_port: default_ssh_port(),
            deploy_dir: default_deploy_dir(),
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
            os: default_os(),
            arch: default_arch(),
        }
    }
}

/// Config overrides applied to every instance, then per role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigs {
    #[serde(default)]
    pub global: ConfigMap,

    #[serde(default, rename = "ts-meta")]
    pub ts_meta: ConfigMap,

    #[serde(default, rename = "ts-sql")]
    pub ts_sql: ConfigMap,

    #[serde(default, rename = "ts-store")]
    pub ts_store: ConfigMap,
}

impl ServerConfigs {
    /// Overrides for `role`, empty for roles without a section
    pub fn for_role(&self, role: Role) -> Option<&ConfigMap> {
        match role {
            Role::TsMeta => Some(&self.ts_meta),
            Role::TsSql => Some(&self.ts_sql),
            Role::TsStore => Some(&self.ts_store),
            Role::TsMonitor | Role::Grafana => None,
        }
    }
}

/// Fields every role spec carries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerBase {
    pub host: String,

    #[serde(default)]
    pub ssh_port: Option<u16>,

    #[serde(default)]
    pub deploy_dir: Option<String>,

    #[serde(default)]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub data_dir: Option<String>,

    #[serde(default)]
    pub os: Option<String>,

    #[serde(default)]
    pub arch: Option<String>,

    /// Per-instance config overrides
    #[serde(default)]
    pub config: ConfigMap,
}

/// Ports of one instance, resolved against the role defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePorts {
    Meta {
        client: u16,
        peer: u16,
        raft: u16,
        gossip: u16,
    },
    Sql {
        http: u16,
    },
    Store {
        ingest: u16,
        select: u16,
        gossip: u16,
    },
    Monitor,
    Grafana {
        http: u16,
    },
}

impl InstancePorts {
    /// Every port the instance binds
    pub fn used(&self) -> Vec<u16> {
        match *self {
            InstancePorts::Meta {
                client,
                peer,
                raft,
                gossip,
            } => vec![client, peer, raft, gossip],
            InstancePorts::Sql { http } => vec![http],
            InstancePorts::Store {
                ingest,
                select,
                gossip,
            } => vec![ingest, select, gossip],
            InstancePorts::Monitor => vec![],
            InstancePorts::Grafana { http } => vec![http],
        }
    }

    /// Port identifying the instance, used in ids and file names
    pub fn main(&self) -> Option<u16> {
        match *self {
            InstancePorts::Meta { client, .. } => Some(client),
            InstancePorts::Sql { http } => Some(http),
            InstancePorts::Store { ingest, .. } => Some(ingest),
            InstancePorts::Monitor => None,
            InstancePorts::Grafana { http } => Some(http),
        }
    }
}

/// Capability every role spec exposes
pub trait RoleSpec {
    fn role(&self) -> Role;
    fn base(&self) -> &ServerBase;
    fn ports(&self) -> InstancePorts;

    fn host(&self) -> &str {
        &self.base().host
    }

    fn ssh_port(&self) -> Option<u16> {
        self.base().ssh_port
    }

    fn deploy_dir(&self) -> Option<&str> {
        self.base().deploy_dir.as_deref()
    }

    fn data_dir(&self) -> Option<&str> {
        self.base().data_dir.as_deref()
    }

    fn log_dir(&self) -> Option<&str> {
        self.base().log_dir.as_deref()
    }

    fn os(&self) -> Option<&str> {
        self.base().os.as_deref()
    }

    fn arch(&self) -> Option<&str> {
        self.base().arch.as_deref()
    }

    fn config(&self) -> &ConfigMap {
        &self.base().config
    }
}

/// `ts-meta` server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TsMetaSpec {
    #[serde(flatten)]
    pub base: ServerBase,

    #[serde(default)]
    pub client_port: Option<u16>,

    #[serde(default)]
    pub peer_port: Option<u16>,

    #[serde(default)]
    pub raft_port: Option<u16>,

    #[serde(default)]
    pub gossip_port: Option<u16>,
}

impl RoleSpec for TsMetaSpec {
    fn role(&self) -> Role {
        Role::TsMeta
    }

    fn base(&self) -> &ServerBase {
        &self.base
    }

    fn ports(&self) -> InstancePorts {
        InstancePorts::Meta {
            client: self.client_port.unwrap_or(META_CLIENT_PORT),
            peer: self.peer_port.unwrap_or(META_PEER_PORT),
            raft: self.raft_port.unwrap_or(META_RAFT_PORT),
            gossip: self.gossip_port.unwrap_or(META_GOSSIP_PORT),
        }
    }
}

/// `ts-sql` server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TsSqlSpec {
    #[serde(flatten)]
    pub base: ServerBase,

    #[serde(default)]
    pub port: Option<u16>,
}

impl RoleSpec for TsSqlSpec {
    fn role(&self) -> Role {
        Role::TsSql
    }

    fn base(&self) -> &ServerBase {
        &self.base
    }

    fn ports(&self) -> InstancePorts {
        InstancePorts::Sql {
            http: self.port.unwrap_or(SQL_PORT),
        }
    }
}

/// `ts-store` server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TsStoreSpec {
    #[serde(flatten)]
    pub base: ServerBase,

    #[serde(default)]
    pub ingest_port: Option<u16>,

    #[serde(default)]
    pub select_port: Option<u16>,

    #[serde(default)]
    pub gossip_port: Option<u16>,
}

impl RoleSpec for TsStoreSpec {
    fn role(&self) -> Role {
        Role::TsStore
    }

    fn base(&self) -> &ServerBase {
        &self.base
    }

    fn ports(&self) -> InstancePorts {
        InstancePorts::Store {
            ingest: self.ingest_port.unwrap_or(STORE_INGEST_PORT),
            select: self.select_port.unwrap_or(STORE_SELECT_PORT),
            gossip: self.gossip_port.unwrap_or(STORE_GOSSIP_PORT),
        }
    }
}

/// `ts-monitor` agent, collecting metrics of the processes on its host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSpec {
    #[serde(flatten)]
    pub base: ServerBase,
}

impl RoleSpec for MonitorSpec {
    fn role(&self) -> Role {
        Role::TsMonitor
    }

    fn base(&self) -> &ServerBase {
        &self.base
    }

    fn ports(&self) -> InstancePorts {
        InstancePorts::Monitor
    }
}

/// Grafana dashboard server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrafanaSpec {
    #[serde(flatten)]
    pub base: ServerBase,

    #[serde(default)]
    pub port: Option<u16>,
}

impl RoleSpec for GrafanaSpec {
    fn role(&self) -> Role {
        Role::Grafana
    }

    fn base(&self) -> &ServerBase {
        &self.base
    }

    fn ports(&self) -> InstancePorts {
        InstancePorts::Grafana {
            http: self.port.unwrap_or(GRAFANA_PORT),
        }
    }
}

/// Whole-cluster topology
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub global: GlobalOptions,

    #[serde(default)]
    pub server_configs: ServerConfigs,

    #[serde(default, rename = "ts-meta")]
    pub ts_meta_servers: Vec<TsMetaSpec>,

    #[serde(default, rename = "ts-sql")]
    pub ts_sql_servers: Vec<TsSqlSpec>,

    #[serde(default, rename = "ts-store")]
    pub ts_store_servers: Vec<TsStoreSpec>,

    #[serde(default, rename = "ts-monitor")]
    pub monitor_servers: Vec<MonitorSpec>,

    #[serde(default, rename = "grafana")]
    pub grafana_servers: Vec<GrafanaSpec>,
}

impl Specification {
    /// Parse a topology document
    pub fn from_yaml(contents: &str) -> Result<Self, GemixError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Read and parse a topology file
    pub async fn load(file: &File) -> Result<Self, GemixError> {
        file.read_yaml().await
    }

    /// Every role spec, in declaration order
    pub fn role_specs(&self) -> Vec<&dyn RoleSpec> {
        let mut specs: Vec<&dyn RoleSpec> = Vec::new();
        specs.extend(self.ts_meta_servers.iter().map(|s| s as &dyn RoleSpec));
        specs.extend(self.ts_sql_servers.iter().map(|s| s as &dyn RoleSpec));
        specs.extend(self.ts_store_servers.iter().map(|s| s as &dyn RoleSpec));
        specs.extend(self.monitor_servers.iter().map(|s| s as &dyn RoleSpec));
        specs.extend(self.grafana_servers.iter().map(|s| s as &dyn RoleSpec));
        specs
    }

    /// Role specs of one role
    pub fn specs_of(&self, role: Role) -> Vec<&dyn RoleSpec> {
        match role {
            Role::TsMeta => self.ts_meta_servers.iter().map(|s| s as &dyn RoleSpec).collect(),
            Role::TsSql => self.ts_sql_servers.iter().map(|s| s as &dyn RoleSpec).collect(),
            Role::TsStore => self.ts_store_servers.iter().map(|s| s as &dyn RoleSpec).collect(),
            Role::TsMonitor => self.monitor_servers.iter().map(|s| s as &dyn RoleSpec).collect(),
            Role::Grafana => self.grafana_servers.iter().map(|s| s as &dyn RoleSpec).collect(),
        }
    }

    /// Distinct hosts, in first-seen order
    pub fn hosts(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.role_specs()
            .into_iter()
            .map(|s| s.host().to_string())
            .filter(|h| seen.insert(h.clone()))
            .collect()
    }

    /// SSH port of `host`: the first per-server override, else the global one
    pub fn ssh_port_of(&self, host: &str) -> u16 {
        self.role_specs()
            .into_iter()
            .filter(|s| s.host() == host)
            .find_map(|s| s.ssh_port())
            .unwrap_or(self.global.ssh_port)
    }

    /// Distinct `(os, arch)` pairs in use
    pub fn platforms(&self) -> BTreeSet<(String, String)> {
        self.role_specs()
            .into_iter()
            .map(|s| {
                (
                    s.os().unwrap_or(self.global.os.as_str()).to_string(),
                    s.arch().unwrap_or(self.global.arch.as_str()).to_string(),
                )
            })
            .collect()
    }

    /// `(os, arch)` of a host
    pub fn platform_of(&self, host: &str) -> (String, String) {
        self.role_specs()
            .into_iter()
            .find(|s| s.host() == host)
            .map(|s| {
                (
                    s.os().unwrap_or(self.global.os.as_str()).to_string(),
                    s.arch().unwrap_or(self.global.arch.as_str()).to_string(),
                )
            })
            .unwrap_or_else(|| (self.global.os.clone(), self.global.arch.clone()))
    }
}
