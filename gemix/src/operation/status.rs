//! Status patrol: read-only sweep of processes, ports and disk

use std::sync::Arc;

use colored::Colorize;
use tokio::sync::Mutex;
use tracing::error;

use crate::errors::GemixError;
use crate::operation::cluster::Cluster;
use crate::operation::{connect_stage, run_stage, ClusterManager};
use crate::task::ops::{HostStatus, StatusSink};
use crate::task::{ParallelStepDisplay, StepDisplay, TaskBuilder};

/// Render one table per host
pub fn render_status(statuses: &[HostStatus]) -> String {
    let mut out = String::new();
    for status in statuses {
        out.push_str(&format!("{}\n", format!("Host {}", status.host).bold()));

        out.push_str("  Processes:\n");
        if status.processes.is_empty() {
            out.push_str(&format!("    {}\n", "none running".yellow()));
        }
        for process in &status.processes {
            out.push_str(&format!("    {}\n", process.green()));
        }

        out.push_str(&format!("  {:<12} {:>6}  {}\n", "Component", "Port", "State"));
        for port in &status.ports {
            let state = if port.listening {
                "listening".green()
            } else {
                "closed".red()
            };
            out.push_str(&format!("  {:<12} {:>6}  {}\n", port.component, port.port, state));
        }

        if !status.disk.is_empty() {
            out.push_str("  Disk:\n");
            for row in &status.disk {
                out.push_str(&format!("    {}\n", row));
            }
        }
    }
    out
}

impl ClusterManager {
    /// Collect and print the state of every host. Hosts that answered are
    /// rendered even when others failed.
    pub async fn status(&self, name: &str) -> Result<Vec<HostStatus>, GemixError> {
        let cluster = Cluster::load(&self.options().layout, name).await?;
        let ctx = self.task_context();
        run_stage("status", connect_stage(&cluster.remote_hosts()), &ctx).await?;

        let sink: StatusSink = Arc::new(Mutex::new(Vec::new()));
        let steps: Vec<StepDisplay> = cluster
            .topology
            .hosts()
            .into_iter()
            .map(|host| {
                let instances = cluster.topology.instances_on(&host);
                let ports = instances
                    .iter()
                    .flat_map(|inst| {
                        let name = inst.component_name().to_string();
                        inst.used_ports().into_iter().map(move |p| (name.clone(), p))
                    })
                    .collect();
                let disk_dir = instances
                    .first()
                    .map(|inst| inst.deploy_dir.clone())
                    .unwrap_or_else(|| "/".to_string());
                TaskBuilder::new()
                    .collect_status(&host, ports, &disk_dir, sink.clone())
                    .step(format!("Inspect {}", host))
            })
            .collect();
        let result = run_stage(
            "status",
            Arc::new(ParallelStepDisplay::new("Collect status", steps, false)),
            &ctx,
        )
        .await;

        let mut statuses = sink.lock().await.clone();
        let order = cluster.topology.hosts();
        statuses.sort_by_key(|s| order.iter().position(|h| *h == s.host));
        self.renderer().block(&render_status(&statuses));

        if let Err(e) = result {
            error!("status of {} is incomplete", cluster.name());
            return Err(e);
        }
        Ok(statuses)
    }
}
