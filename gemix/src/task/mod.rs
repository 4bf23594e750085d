//! Task composition framework
//!
//! A lifecycle operation is a tree of [`Task`]s: leaves do one remote or
//! local action, [`Serial`] and [`Parallel`] compose them, and the display
//! decorators in [`display`] report progress for a subtree. Trees are put
//! together with [`TaskBuilder`].

pub mod builder;
pub mod context;
pub mod display;
pub mod ops;
pub mod parallel;
pub mod serial;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::GemixError;

pub use builder::TaskBuilder;
pub use context::{EventBus, TaskContext, TaskEvent};
pub use display::{ParallelStepDisplay, StepDisplay};
pub use parallel::Parallel;
pub use serial::Serial;

/// Atomic unit of work.
///
/// `Display` gives the human readable description used in logs and progress
/// output.
#[async_trait]
pub trait Task: Send + Sync + fmt::Display {
    /// Run the task, returning the first failure
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError>;

    /// Best-effort undo. Most leaves cannot undo anything.
    async fn rollback(&self, _ctx: &TaskContext) -> Result<(), GemixError> {
        Err(GemixError::UnsupportedRollback(self.to_string()))
    }

    /// Direct children of composite tasks
    fn children(&self) -> &[Arc<dyn Task>] {
        &[]
    }

    /// Stop printing per-child banners; set once a display decorator owns the subtree
    fn set_hide_detail_display(&self, _hide: bool) {}
}

/// Identity of a task node within a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

impl TaskId {
    /// Identity of the node behind `task`. Stable for as long as the tree lives.
    pub fn of(task: &Arc<dyn Task>) -> Self {
        TaskId(Arc::as_ptr(task) as *const () as usize)
    }
}

/// Collect the ids of every node below `task`, unwrapping nested composites
pub fn descendant_ids(task: &Arc<dyn Task>, out: &mut std::collections::HashSet<TaskId>) {
    for child in task.children() {
        out.insert(TaskId::of(child));
        descendant_ids(child, out);
    }
}
