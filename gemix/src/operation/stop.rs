//! Stop: kill every managed process on every host

use std::sync::Arc;

use tracing::info;

use crate::errors::GemixError;
use crate::operation::cluster::Cluster;
use crate::operation::{connect_stage, run_stage, ClusterManager};
use crate::task::{ParallelStepDisplay, StepDisplay, TaskBuilder, TaskContext};
use crate::topology::Specification;

/// Process names to kill, in stop order. Meta goes last.
pub fn stop_process_names(topology: &Specification) -> Vec<String> {
    topology
        .components_by_stop_order()
        .into_iter()
        .filter(|c| c.role().from_package())
        .map(|c| c.name().to_string())
        .collect()
}

impl ClusterManager {
    pub async fn stop(&self, name: &str) -> Result<(), GemixError> {
        let cluster = Cluster::load(&self.options().layout, name).await?;
        let ctx = self.task_context();
        self.stop_with(&ctx, &cluster).await
    }

    pub(crate) async fn stop_with(&self, ctx: &TaskContext, cluster: &Cluster) -> Result<(), GemixError> {
        run_stage("stop", connect_stage(&cluster.remote_hosts()), ctx).await?;

        let names = stop_process_names(&cluster.topology);
        let steps: Vec<StepDisplay> = cluster
            .topology
            .hosts()
            .into_iter()
            .map(|host| {
                TaskBuilder::new()
                    .kill_processes(&host, names.clone())
                    .step(format!("Stop {}", host))
            })
            .collect();
        run_stage(
            "stop",
            Arc::new(ParallelStepDisplay::new("Stop processes", steps, false)),
            ctx,
        )
        .await?;

        info!("Cluster {} stopped", cluster.name());
        Ok(())
    }
}
