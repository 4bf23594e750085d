//! Typed checks on a merged config tree, run before it is encoded

use toml::Value;

use crate::config::merge::{flatten_map, get_path};
use crate::config::ConfigMap;
use crate::errors::GemixError;
use crate::topology::spec::Role;

/// Keys holding a single `host:port`
const ADDRESS_KEYS: &[&str] = &[
    "meta.bind-address",
    "meta.http-bind-address",
    "meta.rpc-bind-address",
    "http.bind-address",
    "data.store-ingest-addr",
    "data.store-select-addr",
    "report.address",
];

/// Keys holding a list of `host:port`
const ADDRESS_LIST_KEYS: &[&str] = &["common.meta-join", "gossip.members"];

/// Keys holding a filesystem path
const DIR_KEYS: &[&str] = &[
    "meta.dir",
    "data.store-data-dir",
    "data.store-wal-dir",
    "data.store-meta-dir",
    "logging.path",
    "monitor.metric-path",
    "monitor.error-log-path",
];

/// Keys holding a TCP port number
const PORT_KEYS: &[&str] = &["gossip.meta-bind-port", "gossip.store-bind-port"];

fn required_keys(role: Role) -> &'static [&'static str] {
    match role {
        Role::TsMeta => &[
            "common.meta-join",
            "meta.bind-address",
            "meta.http-bind-address",
            "meta.rpc-bind-address",
            "meta.dir",
        ],
        Role::TsSql => &["common.meta-join", "http.bind-address"],
        Role::TsStore => &[
            "common.meta-join",
            "data.store-ingest-addr",
            "data.store-select-addr",
            "data.store-data-dir",
        ],
        Role::TsMonitor => &["monitor.host", "monitor.metric-path"],
        Role::Grafana => &[],
    }
}

fn invalid(role: Role, key: &str, reason: impl std::fmt::Display) -> GemixError {
    GemixError::ValidationError(format!("{} config key {}: {}", role, key, reason))
}

/// `host:port` with a non-empty host, a valid port and no leftover placeholder
fn check_address(role: Role, key: &str, value: &Value) -> Result<(), GemixError> {
    let addr = value
        .as_str()
        .ok_or_else(|| invalid(role, key, "expected a host:port string"))?;
    if addr.contains("{{") {
        return Err(invalid(role, key, format!("unresolved placeholder in {:?}", addr)));
    }
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| invalid(role, key, format!("{:?} is not host:port", addr)))?;
    if host.is_empty() {
        return Err(invalid(role, key, format!("{:?} has no host", addr)));
    }
    port.parse::<u16>()
        .map_err(|_| invalid(role, key, format!("{:?} has an invalid port", addr)))?;
    Ok(())
}

/// Validate a merged tree for `role`
pub fn validate(role: Role, conf: &ConfigMap) -> Result<(), GemixError> {
    for key in required_keys(role) {
        if get_path(conf, key).is_none() {
            return Err(invalid(role, key, "missing"));
        }
    }

    for (key, value) in flatten_map(conf) {
        let key = key.as_str();
        if ADDRESS_KEYS.contains(&key) {
            check_address(role, key, &value)?;
        } else if ADDRESS_LIST_KEYS.contains(&key) {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(role, key, "expected a list of host:port"))?;
            if items.is_empty() && required_keys(role).contains(&key) {
                return Err(invalid(role, key, "must not be empty"));
            }
            for item in items {
                check_address(role, key, item)?;
            }
        } else if DIR_KEYS.contains(&key) {
            let dir = value
                .as_str()
                .ok_or_else(|| invalid(role, key, "expected a path string"))?;
            if dir.trim().is_empty() {
                return Err(invalid(role, key, "must not be empty"));
            }
        } else if PORT_KEYS.contains(&key) {
            let port = value
                .as_integer()
                .ok_or_else(|| invalid(role, key, "expected an integer port"))?;
            if !(1..=i64::from(u16::MAX)).contains(&port) {
                return Err(invalid(role, key, format!("{} is out of range", port)));
            }
        }
    }
    Ok(())
}
