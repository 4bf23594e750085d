//! Runtime options threaded through every lifecycle operation

use std::time::Duration;

use tracing::warn;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::CooldownOptions;

/// Environment variable overriding the per-command SSH timeout, in seconds
pub const ENV_SSH_TIMEOUT: &str = "GEMIX_SSH_TIMEOUT";

/// Environment variable overriding the per-transfer timeout, in seconds
pub const ENV_TRANSFER_TIMEOUT: &str = "GEMIX_TRANSFER_TIMEOUT";

/// Environment variable overriding the fan-out concurrency
pub const ENV_CONCURRENCY: &str = "GEMIX_CONCURRENCY";

/// Environment variable overriding the package mirror
pub const ENV_MIRROR: &str = "GEMIX_MIRROR";

/// Main options
#[derive(Debug, Clone)]
pub struct GemixOptions {
    /// Local storage paths
    pub layout: StorageLayout,

    /// SSH options shared by every connection
    pub ssh: SshOptions,

    /// Upper bound on tasks run at once by a `Parallel` composite
    pub concurrency: usize,

    /// Base URL for release archives
    pub mirror_url: String,

    /// Readiness probe between the meta stage and the rest of the start
    pub readiness: ReadinessOptions,
}

impl Default for GemixOptions {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
            ssh: SshOptions::default(),
            concurrency: cpu_count(),
            mirror_url: crate::storage::settings::MirrorSettings::default().base_url,
            readiness: ReadinessOptions::default(),
        }
    }
}

impl GemixOptions {
    /// Build options from the settings file, then apply environment overrides
    pub fn from_settings(layout: StorageLayout, settings: &Settings) -> Self {
        let mut options = Self {
            layout,
            ssh: SshOptions::default(),
            concurrency: settings.concurrency.unwrap_or_else(cpu_count),
            mirror_url: settings.mirror.base_url.clone(),
            readiness: ReadinessOptions {
                attempts: settings.readiness.attempts,
                cooldown: CooldownOptions {
                    base_delay: Duration::from_millis(settings.readiness.base_delay_ms),
                    ..Default::default()
                },
            },
        };
        match positive_secs(settings.ssh_timeout_secs) {
            Some(timeout) => options.ssh.timeout = timeout,
            None => warn!("Ignoring ssh_timeout_secs of 0"),
        }
        match positive_secs(settings.transfer_timeout_secs) {
            Some(timeout) => options.ssh.transfer_timeout = timeout,
            None => warn!("Ignoring transfer_timeout_secs of 0"),
        }
        options.apply_env(|key| std::env::var(key).ok());
        options
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SSH_TIMEOUT) {
            match raw.parse::<u64>().ok().and_then(positive_secs) {
                Some(timeout) => self.ssh.timeout = timeout,
                None => warn!("Ignoring invalid {}: {}", ENV_SSH_TIMEOUT, raw),
            }
        }
        if let Some(raw) = lookup(ENV_TRANSFER_TIMEOUT) {
            match raw.parse::<u64>().ok().and_then(positive_secs) {
                Some(timeout) => self.ssh.transfer_timeout = timeout,
                None => warn!("Ignoring invalid {}: {}", ENV_TRANSFER_TIMEOUT, raw),
            }
        }
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => self.concurrency = n,
                _ => warn!("Ignoring invalid {}: {}", ENV_CONCURRENCY, raw),
            }
        }
        if let Some(mirror) = lookup(ENV_MIRROR) {
            self.mirror_url = mirror;
        }
    }
}

/// Zero would make every remote call time out immediately
fn positive_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// SSH options
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// Timeout for a single remote command
    pub timeout: Duration,

    /// Timeout for a single `scp`, sized for release binaries
    pub transfer_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            transfer_timeout: Duration::from_secs(600),
        }
    }
}

/// Readiness probe options
#[derive(Debug, Clone)]
pub struct ReadinessOptions {
    /// Probe attempts before the start is declared failed
    pub attempts: u32,

    /// Delay schedule between attempts
    pub cooldown: CooldownOptions,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            attempts: 10,
            cooldown: CooldownOptions::default(),
        }
    }
}

/// Number of logical CPUs on the control machine
pub fn cpu_count() -> usize {
    let mut sys = sysinfo::System::new();
    sys.refresh_cpu_all();
    sys.cpus().len().max(1)
}
