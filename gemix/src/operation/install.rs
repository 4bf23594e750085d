//! Install: download, render configs and push everything to the hosts

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::generate::{default_template, HOST_CONF_NAME};
use crate::errors::GemixError;
use crate::executor::actions::UploadAction;
use crate::executor::commands::gen_chmod_exec_command;
use crate::filesys::dir::Dir;
use crate::http::client::PackageClient;
use crate::operation::cluster::{remote_hosts, validate_cluster_name};
use crate::operation::{connect_stage, run_stage, ClusterManager};
use crate::storage::cluster::{save_cluster, ClusterAuth, ClusterMeta};
use crate::task::ops::transfer::package_bin_dir;
use crate::task::{ParallelStepDisplay, StepDisplay, TaskBuilder, TaskContext};
use crate::topology::spec::Role;
use crate::topology::Specification;

/// Launch script shipped with gemix
pub const INSTALL_SCRIPT: &str = include_str!("../../scripts/install.sh");

/// Name of the launch script, locally and remotely
pub const INSTALL_SCRIPT_NAME: &str = "install.sh";

/// Name of the topology copy kept with the cluster metadata
pub const TOPOLOGY_FILE_NAME: &str = "topology.yaml";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Parameters of an install
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub name: String,
    pub version: String,
    /// SSH login user
    pub user: String,
    pub auth: ClusterAuth,
    /// Contents of the topology file
    pub topology_yaml: String,
}

impl ClusterManager {
    pub async fn install(&self, request: InstallRequest) -> Result<(), GemixError> {
        let ctx = self.task_context();
        self.install_with(&ctx, request).await
    }

    pub(crate) async fn install_with(
        &self,
        ctx: &TaskContext,
        request: InstallRequest,
    ) -> Result<(), GemixError> {
        validate_cluster_name(&request.name)?;
        let layout = &self.options().layout;
        let meta_file = layout.cluster_meta_file(&request.name);
        if meta_file.exists().await {
            return Err(GemixError::ValidationError(format!(
                "cluster {} already exists",
                request.name
            )));
        }

        let topology = Specification::from_yaml(&request.topology_yaml)?;
        topology.validate()?;
        let topology = Arc::new(topology);
        if !topology.grafana_servers.is_empty() {
            warn!("grafana servers are tracked but not deployed by gemix");
        }

        let staging = layout.staging_dir(&request.name);
        staging
            .file(INSTALL_SCRIPT_NAME)
            .write_string(INSTALL_SCRIPT)
            .await?;

        let client = PackageClient::new(&self.options().mirror_url, DOWNLOAD_TIMEOUT)?;
        let downloads: Vec<StepDisplay> = topology
            .platforms()
            .into_iter()
            .map(|(os, arch)| {
                let dir = layout.package_dir(&request.version, &os, &arch);
                TaskBuilder::new()
                    .download(client.clone(), &request.version, &os, &arch, dir)
                    .step(format!("Download openGemini {} ({}/{})", request.version, os, arch))
            })
            .collect();
        run_stage(
            "install",
            Arc::new(ParallelStepDisplay::new("Download packages", downloads, false)),
            ctx,
        )
        .await?;

        let template = Arc::new(default_template()?);
        let generate = TaskBuilder::new()
            .generate_host_configs(topology.clone(), template, staging.clone())
            .step("Generate configs");
        run_stage("install", Arc::new(generate), ctx).await?;

        let hosts = remote_hosts(&topology, &request.user, &request.auth);
        run_stage("install", connect_stage(&hosts), ctx).await?;

        let deploys: Vec<StepDisplay> = topology
            .hosts()
            .iter()
            .map(|host| self.deploy_host(host, &topology, &request.version, &staging))
            .collect();
        run_stage(
            "install",
            Arc::new(ParallelStepDisplay::new("Deploy", deploys, false)),
            ctx,
        )
        .await?;

        let cluster_dir = layout.cluster_dir(&request.name);
        let topology_file = cluster_dir.file(TOPOLOGY_FILE_NAME);
        topology_file.write_string(&request.topology_yaml).await?;
        let meta = ClusterMeta::new(
            &request.name,
            &request.version,
            &request.user,
            request.auth.clone(),
            topology_file.path().to_string_lossy(),
        );
        save_cluster(&meta_file, &meta).await?;

        info!("Cluster {} installed with version {}", request.name, request.version);
        Ok(())
    }

    /// Directories, binaries, script and configs for every instance on `host`
    fn deploy_host(
        &self,
        host: &str,
        topology: &Arc<Specification>,
        version: &str,
        staging: &Dir,
    ) -> StepDisplay {
        let instances: Vec<_> = topology
            .instances_on(host)
            .into_iter()
            .filter(|inst| inst.role.from_package())
            .collect();

        let mut roots = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        for inst in &instances {
            let root = inst.install_root(version);
            for sub in ["bin", "etc", "scripts", "pid"] {
                dirs.insert(format!("{}/{}", root, sub));
            }
            dirs.insert(inst.data_dir.clone());
            dirs.insert(inst.log_dir.clone());
            roots.insert(root);
        }

        let mut builder = TaskBuilder::new().mkdir(host, dirs.into_iter().collect(), false);

        let mut uploaded = BTreeSet::new();
        for inst in &instances {
            let package = self
                .options()
                .layout
                .package_dir(version, &inst.os, &inst.arch);
            let action = UploadAction {
                local_dir: package_bin_dir(&package).path().to_string_lossy().into_owned(),
                remote_dir: format!("{}/bin", inst.install_root(version)),
                file_name: inst.component_name().to_string(),
            };
            if uploaded.insert(action.remote_path()) {
                builder = builder.upload(host, action);
            }
        }

        let has_host_conf = instances
            .iter()
            .any(|inst| matches!(inst.role, Role::TsMeta | Role::TsSql | Role::TsStore));
        for root in &roots {
            builder = builder.upload(
                host,
                UploadAction {
                    local_dir: staging.path().to_string_lossy().into_owned(),
                    remote_dir: format!("{}/scripts", root),
                    file_name: INSTALL_SCRIPT_NAME.to_string(),
                },
            );
            if has_host_conf {
                builder = builder.upload(
                    host,
                    UploadAction {
                        local_dir: staging.subdir(host).path().to_string_lossy().into_owned(),
                        remote_dir: format!("{}/etc", root),
                        file_name: HOST_CONF_NAME.to_string(),
                    },
                );
            }
            builder = builder.shell(host, gen_chmod_exec_command(&format!("{}/bin/*", root)), false);
        }

        for inst in instances {
            builder = builder.init_config(inst, topology.clone(), version, staging.clone());
        }

        builder.step(format!("Deploy {}", host))
    }
}
