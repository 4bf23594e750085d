//! Leaves that render configs locally and push them to hosts

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::generate::{render_confs, HOST_CONF_NAME};
use crate::config::merge::{encode_toml, merge_config};
use crate::config::schema;
use crate::config::ConfigMap;
use crate::errors::GemixError;
use crate::executor::Direction;
use crate::filesys::dir::Dir;
use crate::task::{Task, TaskContext};
use crate::topology::instance::Instance;
use crate::topology::spec::{Role, Specification};

/// Writes one `openGemini.conf` per host into the local staging area
pub struct GenerateHostConfigs {
    topology: Arc<Specification>,
    template: Arc<ConfigMap>,
    staging: Dir,
}

impl GenerateHostConfigs {
    pub fn new(topology: Arc<Specification>, template: Arc<ConfigMap>, staging: Dir) -> Self {
        Self {
            topology,
            template,
            staging,
        }
    }
}

#[async_trait]
impl Task for GenerateHostConfigs {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let rendered = render_confs(&self.topology, &self.template)?;
        for (host, doc) in rendered {
            let file = self.staging.subdir(&host).file(HOST_CONF_NAME);
            file.write_atomic(doc.as_bytes()).await.map_err(|e| {
                GemixError::GenerationError(format!("failed to write config for {}: {}", host, e))
            })?;
            ctx.progress(format!("generated config for {}", host));
        }
        Ok(())
    }
}

impl fmt::Display for GenerateHostConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenerateHostConfigs: dir={}", self.staging.path().display())
    }
}

/// Merges the config layers of one instance, validates and uploads the result
pub struct InitConfig {
    instance: Instance,
    topology: Arc<Specification>,
    version: String,
    staging: Dir,
}

impl InitConfig {
    pub fn new(
        instance: Instance,
        topology: Arc<Specification>,
        version: impl Into<String>,
        staging: Dir,
    ) -> Self {
        Self {
            instance,
            topology,
            version: version.into(),
            staging,
        }
    }

    /// Host file, then global and role overrides, then the instance's own
    /// overrides, then computed addresses. Later layers win.
    pub async fn merged_config(&self) -> Result<ConfigMap, GemixError> {
        let host_dir = self.staging.subdir(&self.instance.host);
        let base = match self.instance.role {
            Role::TsMeta | Role::TsSql | Role::TsStore => {
                host_dir.file(HOST_CONF_NAME).read_toml().await?
            }
            Role::TsMonitor | Role::Grafana => ConfigMap::new(),
        };

        let defaults = self.instance.default_config();
        let server_configs = &self.topology.server_configs;
        let mut overlays: Vec<&ConfigMap> = Vec::new();
        if let Some(role_config) = server_configs.for_role(self.instance.role) {
            overlays.push(&server_configs.global);
            overlays.push(role_config);
        }
        overlays.push(&self.instance.config);
        overlays.push(&defaults);

        let merged = merge_config(&base, &overlays);
        schema::validate(self.instance.role, &merged)?;
        Ok(merged)
    }
}

#[async_trait]
impl Task for InitConfig {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let merged = self.merged_config().await?;
        let doc = encode_toml(&merged)?;

        let local = self
            .staging
            .subdir(&self.instance.host)
            .file(&self.instance.conf_file_name());
        local.write_atomic(doc.as_bytes()).await?;

        let remote = self.instance.conf_path(&self.version);
        let executor = ctx.executor(&self.instance.host).await?;
        executor
            .transfer(&local.path().to_string_lossy(), &remote, Direction::Upload)
            .await?;
        debug!("[{}] config written to {}", self.instance.host, remote);
        ctx.progress(format!("config {}", self.instance.conf_file_name()));
        Ok(())
    }
}

impl fmt::Display for InitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InitConfig: component={}, instance={}",
            self.instance.component_name(),
            self.instance.id()
        )
    }
}
