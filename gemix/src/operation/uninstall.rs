//! Uninstall: remove versioned install roots, then the local records

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::errors::GemixError;
use crate::operation::cluster::Cluster;
use crate::operation::{connect_stage, run_stage, ClusterManager};
use crate::storage::cluster::remove_cluster;
use crate::task::{ParallelStepDisplay, StepDisplay, TaskBuilder, TaskContext};
use crate::topology::Specification;

/// Distinct install roots of `version` on `host`
pub fn install_roots(topology: &Specification, host: &str, version: &str) -> Vec<String> {
    topology
        .instances_on(host)
        .into_iter()
        .filter(|inst| inst.role.from_package())
        .map(|inst| inst.install_root(version))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl ClusterManager {
    pub async fn uninstall(&self, name: &str) -> Result<(), GemixError> {
        let cluster = Cluster::load(&self.options().layout, name).await?;
        let ctx = self.task_context();
        self.uninstall_with(&ctx, &cluster).await
    }

    pub(crate) async fn uninstall_with(&self, ctx: &TaskContext, cluster: &Cluster) -> Result<(), GemixError> {
        run_stage("uninstall", connect_stage(&cluster.remote_hosts()), ctx).await?;

        let steps: Vec<StepDisplay> = cluster
            .topology
            .hosts()
            .into_iter()
            .map(|host| {
                install_roots(&cluster.topology, &host, cluster.version())
                    .iter()
                    .fold(TaskBuilder::new(), |b, root| b.remove_install_dir(&host, root))
                    .step(format!("Uninstall {}", host))
            })
            .collect();
        run_stage(
            "uninstall",
            Arc::new(ParallelStepDisplay::new("Remove install directories", steps, false)),
            ctx,
        )
        .await?;

        let layout = &self.options().layout;
        remove_cluster(&layout.cluster_dir(cluster.name())).await?;
        let staging = layout.staging_dir(cluster.name());
        if staging.exists().await {
            staging.delete().await?;
        }

        info!("Cluster {} uninstalled", cluster.name());
        Ok(())
    }
}
