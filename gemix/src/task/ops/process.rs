//! Leaves that control and probe cluster processes

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::app::options::ReadinessOptions;
use crate::errors::GemixError;
use crate::executor::actions::{exec_run_action, exec_stop_action, RunAction, StopAction};
use crate::executor::commands::{
    gen_check_port_command, gen_list_processes_command, parse_process_list, parse_yes_no,
};
use crate::executor::Executor;
use crate::task::{Task, TaskContext};
use crate::topology::instance::Instance;
use crate::utils::calc_exp_backoff;

/// Location of the launch script inside a versioned install root
pub fn script_path(install_root: &str) -> String {
    format!("{}/scripts/install.sh", install_root)
}

/// Whether something already listens on `port`
pub async fn check_port_conflict(executor: &dyn Executor, port: u16) -> Result<bool, GemixError> {
    let output = executor
        .execute(&gen_check_port_command(port), false)
        .await?;
    Ok(parse_yes_no(&output.stdout))
}

/// Managed processes currently running on the host
pub async fn running_processes(executor: &dyn Executor) -> Result<Vec<String>, GemixError> {
    let output = executor.execute(&gen_list_processes_command(), false).await?;
    Ok(parse_process_list(&output.stdout))
}

/// Starts one instance through the uploaded launch script
pub struct Launch {
    instance: Instance,
    version: String,
}

impl Launch {
    pub fn new(instance: Instance, version: impl Into<String>) -> Self {
        Self {
            instance,
            version: version.into(),
        }
    }

    pub fn action(&self) -> RunAction {
        let inst = &self.instance;
        RunAction {
            host: inst.host.clone(),
            script_path: script_path(&inst.install_root(&self.version)),
            component: inst.component_name().to_string(),
            log_dir: inst.log_dir.clone(),
            bin_path: inst.bin_path(&self.version),
            conf_path: inst.conf_path(&self.version),
            pid_path: inst.pid_path(&self.version),
            extra_log_path: inst.extra_log_path(),
        }
    }
}

#[async_trait]
impl Task for Launch {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        ctx.progress(format!("starting {}", self.instance.id()));
        let executor = ctx.executor(&self.instance.host).await?;
        let output = exec_run_action(executor.as_ref(), &self.action()).await?;
        info!("[{}] {}", self.instance.host, output.trim());
        Ok(())
    }
}

impl fmt::Display for Launch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Launch: component={}, instance={}",
            self.instance.component_name(),
            self.instance.id()
        )
    }
}

/// Kills managed processes by name. Missing processes are not an error.
pub struct KillProcesses {
    action: StopAction,
}

impl KillProcesses {
    pub fn new(host: impl Into<String>, process_names: Vec<String>) -> Self {
        Self {
            action: StopAction {
                host: host.into(),
                process_names,
            },
        }
    }
}

#[async_trait]
impl Task for KillProcesses {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.action.host).await?;
        for message in exec_stop_action(executor.as_ref(), &self.action).await? {
            info!("[{}] {}", self.action.host, message);
            ctx.progress(message);
        }
        Ok(())
    }
}

impl fmt::Display for KillProcesses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KillProcesses: host={}, processes={}",
            self.action.host,
            self.action.process_names.join(",")
        )
    }
}

/// Fails when a managed process already runs or a configured port is taken
pub struct CheckConflicts {
    host: String,
    ports: Vec<u16>,
}

impl CheckConflicts {
    pub fn new(host: impl Into<String>, ports: Vec<u16>) -> Self {
        Self {
            host: host.into(),
            ports,
        }
    }
}

#[async_trait]
impl Task for CheckConflicts {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.host).await?;

        ctx.progress("checking processes");
        if let Some(name) = running_processes(executor.as_ref()).await?.first() {
            return Err(GemixError::ConflictError(format!(
                "process {} is already running on {}",
                name, self.host
            )));
        }

        for port in &self.ports {
            ctx.progress(format!("checking port {}", port));
            if check_port_conflict(executor.as_ref(), *port).await? {
                return Err(GemixError::ConflictError(format!(
                    "port {} is already in use on {}",
                    port, self.host
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CheckConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
        write!(f, "CheckConflicts: host={}, ports={}", self.host, ports.join(","))
    }
}

/// Polls until every port listens, backing off between attempts
pub struct WaitPortsReady {
    host: String,
    ports: Vec<u16>,
    readiness: ReadinessOptions,
}

impl WaitPortsReady {
    pub fn new(host: impl Into<String>, ports: Vec<u16>, readiness: ReadinessOptions) -> Self {
        Self {
            host: host.into(),
            ports,
            readiness,
        }
    }
}

#[async_trait]
impl Task for WaitPortsReady {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let executor = ctx.executor(&self.host).await?;
        let attempts = self.readiness.attempts.max(1);

        for attempt in 0..attempts {
            let mut pending = Vec::new();
            for port in &self.ports {
                if !check_port_conflict(executor.as_ref(), *port).await? {
                    pending.push(*port);
                }
            }
            if pending.is_empty() {
                debug!("[{}] ports ready after {} attempt(s)", self.host, attempt + 1);
                return Ok(());
            }

            ctx.progress(format!("waiting for ports {:?}", pending));
            if attempt + 1 < attempts {
                let delay = calc_exp_backoff(&self.readiness.cooldown, attempt);
                warn!(
                    "[{}] ports {:?} not ready, retrying in {:?}",
                    self.host, pending, delay
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(GemixError::ExecutionError(format!(
            "ports {:?} on {} not ready after {} attempts",
            self.ports, self.host, attempts
        )))
    }
}

impl fmt::Display for WaitPortsReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WaitPortsReady: host={}, ports={:?}", self.host, self.ports)
    }
}
