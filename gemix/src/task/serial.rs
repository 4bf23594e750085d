//! Ordered composite

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::GemixError;
use crate::task::{Task, TaskContext, TaskEvent, TaskId};

/// Runs its children one after another
pub struct Serial {
    tasks: Vec<Arc<dyn Task>>,
    ignore_error: bool,
    hide_detail_display: AtomicBool,
}

impl Serial {
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
}

#[async_trait]
impl Task for Serial {
    /// Stops at the first failing child unless errors are ignored
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        for task in &self.tasks {
            let id = TaskId::of(task);
            if !self.hide_detail_display.load(Ordering::Relaxed) {
                info!("+ [ Serial ] - {}", task);
            }

            ctx.events().publish(TaskEvent::Begin { id });
            let result = task.execute(&ctx.with_task(id)).await;
            ctx.events().publish(TaskEvent::Finish {
                id,
                error: result.as_ref().err().map(|e| e.to_string()),
            });

            if let Err(e) = result {
                if self.ignore_error {
                    warn!("Ignoring failure of {}: {}", task, e);
                    continue;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undo children in reverse order
    async fn rollback(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        for task in self.tasks.iter().rev() {
            task.rollback(&ctx.with_task(TaskId::of(task))).await?;
        }
        Ok(())
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

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.tasks.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join("\n"))
    }
}
