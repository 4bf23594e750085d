//! Utility functions

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Version information for gemix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
    pub target: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
        target: option_env!("BUILD_TARGET").unwrap_or("unknown").to_string(),
    }
}

/// Cooldown options for exponential backoff
#[derive(Debug, Clone)]
pub struct CooldownOptions {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for CooldownOptions {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Calculate exponential backoff delay
pub fn calc_exp_backoff(options: &CooldownOptions, attempt: u32) -> Duration {
    let delay_secs = options.base_delay.as_secs_f64() * options.multiplier.powi(attempt as i32);
    let capped_delay = delay_secs.min(options.max_delay.as_secs_f64());
    Duration::from_secs_f64(capped_delay)
}

/// Cluster names end up in local paths, so only a conservative charset is allowed
pub fn is_valid_cluster_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Resolve the user home directory
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Join `dir` onto `base` unless it is already absolute
pub fn abs_path(base: &str, dir: &str) -> String {
    if dir.starts_with('/') {
        dir.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), dir)
    }
}
