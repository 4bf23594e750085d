//! Cluster lifecycle operations
//!
//! Every operation builds a task tree per stage and runs the stages in order.
//! Per-host fan-out is a [`Parallel`](crate::task::Parallel) bounded by the
//! configured concurrency. Failures inside a fan-out are logged as they
//! happen and the operation as a whole returns
//! [`GemixError::OperationFailed`].

pub mod cluster;
pub mod fsm;
pub mod install;
pub mod start;
pub mod status;
pub mod stop;
pub mod uninstall;
pub mod upgrade;

use std::sync::Arc;

use tracing::error;

use crate::app::options::GemixOptions;
use crate::errors::GemixError;
use crate::executor::ssh::RemoteHost;
use crate::executor::Connector;
use crate::task::display::Renderer;
use crate::task::{ParallelStepDisplay, StepDisplay, Task, TaskBuilder, TaskContext, TaskId};

pub use cluster::{resolve_auth, Cluster};
pub use install::InstallRequest;

/// Entry point for lifecycle operations
pub struct ClusterManager {
    options: GemixOptions,
    connector: Arc<dyn Connector>,
    renderer: Arc<dyn Renderer>,
}

impl ClusterManager {
    pub fn new(
        options: GemixOptions,
        connector: Arc<dyn Connector>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            options,
            connector,
            renderer,
        }
    }

    pub fn options(&self) -> &GemixOptions {
        &self.options
    }

    /// Fresh context with an empty executor pool
    pub fn task_context(&self) -> TaskContext {
        TaskContext::new(
            self.connector.clone(),
            self.renderer.clone(),
            self.options.concurrency,
        )
    }

    pub(crate) fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }
}

/// Run one stage of `operation`.
///
/// Validation, connection and conflict errors surface unchanged. Anything
/// else is logged and collapsed into [`GemixError::OperationFailed`].
pub(crate) async fn run_stage(
    operation: &str,
    stage: Arc<dyn Task>,
    ctx: &TaskContext,
) -> Result<(), GemixError> {
    let stage_ctx = ctx.with_task(TaskId::of(&stage));
    match stage.execute(&stage_ctx).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_preflight() => Err(e),
        Err(e) => {
            error!("{} failed: {}", operation, e);
            Err(GemixError::OperationFailed(operation.to_string()))
        }
    }
}

/// Open a session to every host. Must complete before any fan-out touches
/// the executor pool.
pub(crate) fn connect_stage(hosts: &[RemoteHost]) -> Arc<dyn Task> {
    let steps: Vec<StepDisplay> = hosts
        .iter()
        .map(|host| {
            TaskBuilder::new()
                .ssh_connect(host.clone())
                .step(format!("Connect {}", host.ip))
        })
        .collect();
    Arc::new(ParallelStepDisplay::new("Connect to hosts", steps, false))
}
