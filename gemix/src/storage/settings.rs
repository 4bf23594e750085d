//! Settings file management

use serde::{Deserialize, Serialize};

use crate::errors::GemixError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// User settings, read from `<gemix-home>/settings.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Timeout applied to every remote command, in seconds
    #[serde(default = "default_ssh_timeout")]
    pub ssh_timeout_secs: u64,

    /// Timeout applied to every file transfer, in seconds
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,

    /// Maximum number of hosts worked on at once. `None` means one per CPU.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Package mirror configuration
    #[serde(default)]
    pub mirror: MirrorSettings,

    /// Readiness probe run between the meta stage and the rest of the start
    #[serde(default)]
    pub readiness: ReadinessSettings,
}

fn default_ssh_timeout() -> u64 {
    60
}

fn default_transfer_timeout() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            ssh_timeout_secs: default_ssh_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
            concurrency: None,
            mirror: MirrorSettings::default(),
            readiness: ReadinessSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent
    pub async fn load(file: &File) -> Result<Self, GemixError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json().await
    }
}

/// Package mirror settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Base URL the release archives are published under
    #[serde(default = "default_mirror_url")]
    pub base_url: String,
}

fn default_mirror_url() -> String {
    "https://github.com/openGemini/openGemini/releases/download".to_string()
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            base_url: default_mirror_url(),
        }
    }
}

/// Readiness probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSettings {
    /// Probe attempts before giving up
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,

    /// Initial delay between probes, in milliseconds. Doubles per attempt.
    #[serde(default = "default_probe_delay")]
    pub base_delay_ms: u64,
}

fn default_probe_attempts() -> u32 {
    10
}

fn default_probe_delay() -> u64 {
    500
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            attempts: default_probe_attempts(),
            base_delay_ms: default_probe_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"log_level": "debug", "concurrency": 4}"#).unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.concurrency, Some(4));
        assert_eq!(settings.ssh_timeout_secs, 60);
        assert_eq!(settings.transfer_timeout_secs, 600);
        assert_eq!(settings.readiness.attempts, 10);
        assert!(settings.mirror.base_url.starts_with("https://"));
    }
}
