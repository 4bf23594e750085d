//! Concurrent composite with bounded fan-out

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::errors::GemixError;
use crate::task::{Task, TaskContext, TaskEvent, TaskId};

/// Runs its children concurrently, at most `ctx.concurrency()` at a time.
///
/// Every child runs to completion. Only the first error observed is
/// returned; the others are logged and dropped. With `ignore_error` all
/// errors are swallowed.
pub struct Parallel {
    tasks: Vec<Arc<dyn Task>>,
    ignore_error: bool,
    hide_detail_display: AtomicBool,
}

impl Parallel {
    pub fn new(tasks: Vec<Arc<dyn Task>>, ignore_error: bool) -> Self {
        Self {
            tasks,
            ignore_error,
            hide_detail_display: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    async fn run_all<F>(&self, ctx: &TaskContext, publish: bool, op: F) -> Option<GemixError>
    where
        F: Fn(Arc<dyn Task>, TaskContext) -> futures::future::BoxFuture<'static, Result<(), GemixError>>,
    {
        let semaphore = Arc::new(Semaphore::new(ctx.concurrency()));
        let mut set = JoinSet::new();

        for task in &self.tasks {
            let id = TaskId::of(task);
            if publish && !self.hide_detail_display.load(Ordering::Relaxed) {
                info!("+ [Parallel] - {}", task);
            }
            let semaphore = semaphore.clone();
            let child_ctx = ctx.with_task(id);
            let description = task.to_string();
            let fut = op(task.clone(), child_ctx.clone());

            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| (description.clone(), GemixError::Internal(e.to_string())))?;
                if publish {
                    child_ctx.events().publish(TaskEvent::Begin { id });
                }
                let result = fut.await;
                if publish {
                    child_ctx.events().publish(TaskEvent::Finish {
                        id,
                        error: result.as_ref().err().map(|e| e.to_string()),
                    });
                }
                result.map_err(|e| (description, e))
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(failure)) => failure,
                Err(e) => ("<panicked task>".to_string(), GemixError::Internal(e.to_string())),
            };
            let (description, e) = failure;
            error!("{} failed: {}", description, e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
        first_error
    }
}

#[async_trait]
impl Task for Parallel {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let first_error = self
            .run_all(ctx, true, |task, ctx| {
                Box::pin(async move { task.execute(&ctx).await })
            })
            .await;

        match first_error {
            Some(e) if !self.ignore_error => Err(e),
            _ => Ok(()),
        }
    }

    async fn rollback(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let first_error = self
            .run_all(ctx, false, |task, ctx| {
                Box::pin(async move { task.rollback(&ctx).await })
            })
            .await;
        first_error.map_or(Ok(()), Err)
    }

    fn children(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    fn set_hide_detail_display(&self, hide: bool) {
        self.hide_detail_display.store(hide, Ordering::Relaxed);
        for task in &self.tasks {
            task.set_hide_detail_display(hide);
        }
    }
}

impl fmt::Display for Parallel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tasks.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join("\n"))
    }
}
