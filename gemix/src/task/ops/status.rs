//! Read-only status collection for one host

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::GemixError;
use crate::executor::commands::gen_disk_usage_command;
use crate::task::ops::process::{check_port_conflict, running_processes};
use crate::task::{Task, TaskContext};

/// Occupancy of one configured port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    pub component: String,
    pub port: u16,
    pub listening: bool,
}

/// Everything the patrol learned about one host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStatus {
    pub host: String,
    pub processes: Vec<String>,
    pub ports: Vec<PortStatus>,
    /// `df -h` rows, header excluded
    pub disk: Vec<String>,
}

/// Shared collection point for [`CollectStatus`] results
pub type StatusSink = Arc<Mutex<Vec<HostStatus>>>;

/// Collects running processes, port occupancy and disk capacity
pub struct CollectStatus {
    host: String,
    ports: Vec<(String, u16)>,
    disk_dir: String,
    sink: StatusSink,
}

impl CollectStatus {
    pub fn new(
        host: impl Into<String>,
        ports: Vec<(String, u16)>,
        disk_dir: impl Into<String>,
        sink: StatusSink,
    ) -> Self {
        Self {
            host: host.into(),
            ports,
            disk_dir: disk_dir.into(),
            sink,
        }
    }
}

#[async_trait]
impl Task for CollectStatus {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.host).await?;

        ctx.progress("processes");
        let processes = running_processes(executor.as_ref()).await?;

        let mut ports = Vec::with_capacity(self.ports.len());
        for (component, port) in &self.ports {
            ctx.progress(format!("port {}", port));
            ports.push(PortStatus {
                component: component.clone(),
                port: *port,
                listening: check_port_conflict(executor.as_ref(), *port).await?,
            });
        }

        ctx.progress("disk");
        let df = executor
            .execute(&gen_disk_usage_command(&self.disk_dir), false)
            .await?;
        let disk = df.stdout.lines().skip(1).map(str::to_string).collect();

        self.sink.lock().await.push(HostStatus {
            host: self.host.clone(),
            processes,
            ports,
            disk,
        });
        Ok(())
    }
}

impl fmt::Display for CollectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectStatus: host={}", self.host)
    }
}
