//! Start: preflight, meta first, readiness barrier, then everything else.
//! A host that fails to launch does not hold back the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::errors::GemixError;
use crate::executor::ssh::RemoteHost;
use crate::operation::cluster::Cluster;
use crate::operation::{connect_stage, run_stage, ClusterManager};
use crate::task::{ParallelStepDisplay, StepDisplay, Task, TaskBuilder, TaskContext};
use crate::topology::instance::Instance;
use crate::topology::spec::{InstancePorts, Role};

/// Group instances by host, keeping first-seen host order
pub(crate) fn group_by_host(instances: Vec<Instance>) -> Vec<(String, Vec<Instance>)> {
    let mut order = Vec::new();
    let mut groups: BTreeMap<String, Vec<Instance>> = BTreeMap::new();
    for inst in instances {
        if !groups.contains_key(&inst.host) {
            order.push(inst.host.clone());
        }
        groups.entry(inst.host.clone()).or_default().push(inst);
    }
    order
        .into_iter()
        .filter_map(|host| groups.remove(&host).map(|list| (host, list)))
        .collect()
}

/// One progress line per host launching `instances`
fn launch_stage(title: &str, instances: Vec<Instance>, version: &str) -> Arc<dyn Task> {
    let steps: Vec<StepDisplay> = group_by_host(instances)
        .into_iter()
        .map(|(host, list)| {
            let names: Vec<&str> = list.iter().map(|i| i.component_name()).collect();
            let prefix = format!("Start {} on {}", names.join(","), host);
            list.into_iter()
                .fold(TaskBuilder::new(), |b, inst| b.launch(inst, version))
                .step(prefix)
        })
        .collect();
    Arc::new(ParallelStepDisplay::new(title, steps, false))
}

impl ClusterManager {
    pub async fn start(&self, name: &str) -> Result<(), GemixError> {
        let cluster = Cluster::load(&self.options().layout, name).await?;
        let ctx = self.task_context();
        self.start_with(&ctx, &cluster).await
    }

    pub(crate) async fn start_with(&self, ctx: &TaskContext, cluster: &Cluster) -> Result<(), GemixError> {
        let topology = &cluster.topology;
        let version = cluster.version();

        let hosts: Vec<RemoteHost> = cluster.remote_hosts();
        run_stage("start", connect_stage(&hosts), ctx).await?;

        let run_as = topology.global.user.clone();
        let create_user = run_as != cluster.meta.user;
        let preflight: Vec<StepDisplay> = topology
            .hosts()
            .into_iter()
            .map(|host| {
                let ports: Vec<u16> = topology
                    .instances_on(&host)
                    .iter()
                    .filter(|i| i.role.from_package())
                    .flat_map(|i| i.used_ports())
                    .collect();
                let mut builder = TaskBuilder::new().check_conflicts(&host, ports);
                if create_user {
                    builder = builder.user_create(&host, &run_as);
                }
                builder.step(format!("Preflight {}", host))
            })
            .collect();
        run_stage(
            "start",
            Arc::new(ParallelStepDisplay::new("Preflight checks", preflight, false)),
            ctx,
        )
        .await?;

        // Launch failures are recorded so healthy hosts keep going.
        let mut failure: Option<GemixError> = None;

        let readiness = self.options().readiness.clone();
        let metas: Vec<StepDisplay> = group_by_host(topology.instances_of(Role::TsMeta))
            .into_iter()
            .map(|(host, list)| {
                let ports: Vec<u16> = list
                    .iter()
                    .filter_map(|inst| match inst.ports {
                        InstancePorts::Meta { client, .. } => Some(client),
                        _ => None,
                    })
                    .collect();
                list.into_iter()
                    .fold(TaskBuilder::new(), |b, inst| b.launch(inst, version))
                    .wait_ports_ready(&host, ports, readiness.clone())
                    .step(format!("Start ts-meta on {}", host))
            })
            .collect();
        let meta_stage = Arc::new(ParallelStepDisplay::new("Start ts-meta", metas, false));
        if let Err(e) = run_stage("start", meta_stage, ctx).await {
            failure.get_or_insert(e);
        }

        let mut rest = Vec::new();
        for component in topology.components_by_start_order() {
            match component.role() {
                Role::TsMeta => {}
                Role::Grafana => warn!("skipping grafana: it is not managed by gemix"),
                _ => rest.extend(component.instances()),
            }
        }
        if !rest.is_empty() {
            if let Err(e) = run_stage("start", launch_stage("Start ts-store, ts-sql", rest, version), ctx).await {
                failure.get_or_insert(e);
            }
        }

        if let Some(e) = failure {
            error!("Cluster {} started with failures", cluster.name());
            return Err(e);
        }
        info!("Cluster {} started", cluster.name());
        Ok(())
    }
}
