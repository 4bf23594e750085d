//! Per-host config files rendered from the openGemini template
//!
//! Address fields whose port was not set explicitly in the topology keep the
//! template value with its placeholder prefix swapped for the host IP. The
//! template placeholders must therefore be exactly [`ADDR_PLACEHOLDER_LEN`]
//! (`{{addr}}`) or [`META_ADDR_PLACEHOLDER_LEN`] (`{{meta_addr_1}}`)
//! characters long.

use std::collections::BTreeMap;
use std::sync::Arc;

use toml::Value;

use crate::config::merge::{encode_toml, get_path, set_path};
use crate::config::ConfigMap;
use crate::errors::GemixError;
use crate::topology::instance::{ClusterPeers, Instance};
use crate::topology::spec::{RoleSpec, Specification};

/// Template shipped with gemix
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/openGemini.conf");

/// File name of the generated per-host config
pub const HOST_CONF_NAME: &str = "openGemini.conf";

/// Length of `{{addr}}`
pub const ADDR_PLACEHOLDER_LEN: usize = 8;

/// Length of `{{meta_addr_1}}`
pub const META_ADDR_PLACEHOLDER_LEN: usize = 15;

/// Parse the built-in template
pub fn default_template() -> Result<ConfigMap, GemixError> {
    Ok(DEFAULT_TEMPLATE.parse::<ConfigMap>()?)
}

/// Replace the first `len` characters of `value` with `ip`
pub fn substitute_prefix(value: &str, len: usize, ip: &str) -> Result<String, GemixError> {
    let rest = value.get(len..).ok_or_else(|| {
        GemixError::GenerationError(format!(
            "template value {:?} is shorter than its {} character placeholder",
            value, len
        ))
    })?;
    Ok(format!("{}{}", ip, rest))
}

fn template_str<'a>(template: &'a ConfigMap, path: &str) -> Result<&'a str, GemixError> {
    match get_path(template, path) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(Value::Array(items)) => items.first().and_then(|v| v.as_str()).ok_or_else(|| {
            GemixError::GenerationError(format!("template {} has no string entry", path))
        }),
        _ => Err(GemixError::GenerationError(format!(
            "template is missing {}",
            path
        ))),
    }
}

/// `host:port` when the port is explicit, else the template address rebased on `host`
fn address(
    template: &ConfigMap,
    path: &str,
    len: usize,
    host: &str,
    port: Option<u16>,
) -> Result<String, GemixError> {
    match port {
        Some(port) => Ok(format!("{}:{}", host, port)),
        None => substitute_prefix(template_str(template, path)?, len, host),
    }
}

/// Render one config tree per physical host running ts-meta, ts-sql or ts-store
pub fn gen_confs(
    topology: &Specification,
    template: &ConfigMap,
) -> Result<BTreeMap<String, ConfigMap>, GemixError> {
    let peers = Arc::new(ClusterPeers::from_topology(topology));

    let mut meta_join = Vec::new();
    let mut gossip_members = Vec::new();
    for meta in &topology.ts_meta_servers {
        meta_join.push(Value::String(address(
            template,
            "common.meta-join",
            META_ADDR_PLACEHOLDER_LEN,
            meta.host(),
            meta.peer_port,
        )?));
        gossip_members.push(Value::String(address(
            template,
            "gossip.members",
            META_ADDR_PLACEHOLDER_LEN,
            meta.host(),
            meta.gossip_port,
        )?));
    }

    let mut confs = BTreeMap::new();
    for host in topology.hosts() {
        let meta = topology.ts_meta_servers.iter().find(|s| s.host() == host);
        let sql = topology.ts_sql_servers.iter().find(|s| s.host() == host);
        let store = topology.ts_store_servers.iter().find(|s| s.host() == host);
        let monitor = topology.monitor_servers.iter().find(|s| s.host() == host);
        if meta.is_none() && sql.is_none() && store.is_none() {
            continue;
        }

        let mut conf = template.clone();
        set_path(&mut conf, "common.meta-join", Value::Array(meta_join.clone()));
        set_path(&mut conf, "gossip.members", Value::Array(gossip_members.clone()));
        set_path(
            &mut conf,
            "gossip.bind-address",
            substitute_prefix(
                template_str(template, "gossip.bind-address")?,
                ADDR_PLACEHOLDER_LEN,
                &host,
            )?,
        );

        let mut log_dir = None;

        match meta {
            Some(spec) => {
                let inst = Instance::new(spec, topology, peers.clone());
                for (path, port) in [
                    ("meta.bind-address", spec.raft_port),
                    ("meta.http-bind-address", spec.client_port),
                    ("meta.rpc-bind-address", spec.peer_port),
                ] {
                    let addr = address(template, path, ADDR_PLACEHOLDER_LEN, &host, port)?;
                    set_path(&mut conf, path, addr);
                }
                set_path(&mut conf, "meta.dir", format!("{}/meta", inst.data_dir));
                if let Some(port) = spec.gossip_port {
                    set_path(&mut conf, "gossip.meta-bind-port", i64::from(port));
                }
                log_dir.get_or_insert(inst.log_dir);
            }
            None => {
                conf.insert("meta".to_string(), Value::Table(ConfigMap::new()));
            }
        }

        match sql {
            Some(spec) => {
                let inst = Instance::new(spec, topology, peers.clone());
                let addr = address(template, "http.bind-address", ADDR_PLACEHOLDER_LEN, &host, spec.port)?;
                set_path(&mut conf, "http.bind-address", addr);
                log_dir.get_or_insert(inst.log_dir);
            }
            None => {
                conf.insert("http".to_string(), Value::Table(ConfigMap::new()));
            }
        }

        match store {
            Some(spec) => {
                let inst = Instance::new(spec, topology, peers.clone());
                for (path, port) in [
                    ("data.store-ingest-addr", spec.ingest_port),
                    ("data.store-select-addr", spec.select_port),
                ] {
                    let addr = address(template, path, ADDR_PLACEHOLDER_LEN, &host, port)?;
                    set_path(&mut conf, path, addr);
                }
                set_path(&mut conf, "data.store-data-dir", inst.data_dir.clone());
                set_path(&mut conf, "data.store-wal-dir", format!("{}/wal", inst.data_dir));
                set_path(&mut conf, "data.store-meta-dir", format!("{}/meta", inst.data_dir));
                if let Some(port) = spec.gossip_port {
                    set_path(&mut conf, "gossip.store-bind-port", i64::from(port));
                }
                log_dir.get_or_insert(inst.log_dir);
            }
            None => {
                conf.insert("data".to_string(), Value::Table(ConfigMap::new()));
            }
        }

        if let Some(dir) = log_dir {
            set_path(&mut conf, "logging.path", dir);
        }

        if let Some(spec) = monitor {
            let inst = Instance::new(spec, topology, peers.clone());
            set_path(&mut conf, "monitor.pushers", "file");
            set_path(&mut conf, "monitor.store-enabled", true);
            set_path(
                &mut conf,
                "monitor.store-path",
                format!("{}/metric/{}/metric.data", inst.log_dir, host),
            );
        }

        confs.insert(host, conf);
    }

    Ok(confs)
}

/// [`gen_confs`] encoded as TOML documents, keyed by host
pub fn render_confs(
    topology: &Specification,
    template: &ConfigMap,
) -> Result<BTreeMap<String, String>, GemixError> {
    gen_confs(topology, template)?
        .into_iter()
        .map(|(host, conf)| Ok((host, encode_toml(&conf)?)))
        .collect()
}
