//! Flatten, fold and overlay config trees

use toml::Value;

use crate::config::ConfigMap;
use crate::errors::GemixError;

/// Banner placed at the top of every generated file
pub const GENERATED_BANNER: &str = "# WARNING: This file is auto-generated by gemix. Do not edit!\n\
# All modifications will be overwritten on the next deploy.\n\
# Change the topology file's server_configs instead.\n\n";

/// Join nested keys with `.`. Empty tables are kept as leaves.
pub fn flatten_map(map: &ConfigMap) -> ConfigMap {
    let mut out = ConfigMap::new();
    flatten_into(&mut out, "", map);
    out
}

fn flatten_into(out: &mut ConfigMap, prefix: &str, map: &ConfigMap) {
    for (key, value) in map {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Table(sub) if !sub.is_empty() => flatten_into(out, &full, sub),
            other => {
                out.insert(full, other.clone());
            }
        }
    }
}

/// Inverse of [`flatten_map`]: split keys on their first `.` and nest
pub fn fold_map(map: &ConfigMap) -> ConfigMap {
    let mut out = ConfigMap::new();
    for (key, value) in map {
        let value = match value {
            Value::Table(sub) => Value::Table(fold_map(sub)),
            other => other.clone(),
        };
        match key.split_once('.') {
            None => patch_value(&mut out, key, value),
            Some((head, rest)) => {
                let mut sub = ConfigMap::new();
                sub.insert(rest.to_string(), value);
                patch_value(&mut out, head, Value::Table(fold_map(&sub)));
            }
        }
    }
    out
}

/// Overlay `value` at `key`: tables merge key by key, anything else replaces
fn patch_value(target: &mut ConfigMap, key: &str, value: Value) {
    match (target.get_mut(key), value) {
        (Some(Value::Table(existing)), Value::Table(incoming)) => {
            for (k, v) in incoming {
                patch_value(existing, &k, v);
            }
        }
        (_, value) => {
            target.insert(key.to_string(), value);
        }
    }
}

/// Fold `base`, then patch each overlay on top of it in order. The last
/// overlay to set a leaf wins.
pub fn merge_config(base: &ConfigMap, overlays: &[&ConfigMap]) -> ConfigMap {
    let mut merged = fold_map(base);
    for overlay in overlays {
        for (key, value) in fold_map(overlay) {
            patch_value(&mut merged, &key, value);
        }
    }
    merged
}

/// Merge and encode as a TOML document with the generated-file banner
pub fn merge_to_toml(base: &ConfigMap, overlays: &[&ConfigMap]) -> Result<String, GemixError> {
    let merged = merge_config(base, overlays);
    encode_toml(&merged)
}

/// Encode a folded tree with the generated-file banner
pub fn encode_toml(map: &ConfigMap) -> Result<String, GemixError> {
    let body = toml::to_string(map)
        .map_err(|e| GemixError::GenerationError(format!("failed to encode config: {}", e)))?;
    Ok(format!("{}{}", GENERATED_BANNER, body))
}

/// Set a leaf by dotted path, creating intermediate tables
pub fn set_path(map: &mut ConfigMap, path: &str, value: impl Into<Value>) {
    let mut sub = ConfigMap::new();
    sub.insert(path.to_string(), value.into());
    for (key, value) in fold_map(&sub) {
        patch_value(map, &key, value);
    }
}

/// Look up a leaf by dotted path
pub fn get_path<'a>(map: &'a ConfigMap, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => map.get(path),
        Some((head, rest)) => match map.get(head) {
            Some(Value::Table(sub)) => get_path(sub, rest),
            _ => None,
        },
    }
}

/// Remove a leaf by dotted path
pub fn remove_path(map: &mut ConfigMap, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => map.remove(path),
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Table(sub)) => remove_path(sub, rest),
            _ => None,
        },
    }
}
