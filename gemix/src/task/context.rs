//! Execution context shared by every task of a tree

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::errors::GemixError;
use crate::executor::pool::ExecutorPool;
use crate::executor::{Connector, Executor};
use crate::task::display::Renderer;
use crate::task::TaskId;

const EVENT_CAPACITY: usize = 1024;

/// Lifecycle notifications published while a tree runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Begin { id: TaskId },
    Progress { id: TaskId, message: String },
    Finish { id: TaskId, error: Option<String> },
}

impl TaskEvent {
    pub fn id(&self) -> TaskId {
        match self {
            TaskEvent::Begin { id } | TaskEvent::Progress { id, .. } | TaskEvent::Finish { id, .. } => *id,
        }
    }
}

/// Broadcast channel for [`TaskEvent`]s. Publishing never blocks and events
/// are dropped when nobody listens.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

struct Shared {
    events: EventBus,
    executors: ExecutorPool,
    connector: Arc<dyn Connector>,
    renderer: Arc<dyn Renderer>,
    concurrency: usize,
}

/// Context handed to [`Task::execute`](crate::task::Task::execute).
///
/// Cheap to clone. Composites derive a child context per task so progress
/// events carry the identity of the task that emitted them.
#[derive(Clone)]
pub struct TaskContext {
    shared: Arc<Shared>,
    current: Option<TaskId>,
}

impl TaskContext {
    pub fn new(
        connector: Arc<dyn Connector>,
        renderer: Arc<dyn Renderer>,
        concurrency: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                events: EventBus::new(),
                executors: ExecutorPool::new(),
                connector,
                renderer,
                concurrency: concurrency.max(1),
            }),
            current: None,
        }
    }

    /// Context for running the task identified by `id`
    pub fn with_task(&self, id: TaskId) -> Self {
        Self {
            shared: self.shared.clone(),
            current: Some(id),
        }
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn executors(&self) -> &ExecutorPool {
        &self.shared.executors
    }

    pub async fn executor(&self, host: &str) -> Result<Arc<dyn Executor>, GemixError> {
        self.shared.executors.get(host).await
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.shared.connector
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.shared.renderer
    }

    /// Upper bound on tasks a `Parallel` runs at once
    pub fn concurrency(&self) -> usize {
        self.shared.concurrency
    }

    /// Report progress of the current task
    pub fn progress(&self, message: impl Into<String>) {
        if let Some(id) = self.current {
            self.shared.events.publish(TaskEvent::Progress {
                id,
                message: message.into(),
            });
        }
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("current", &self.current)
            .field("concurrency", &self.shared.concurrency)
            .finish_non_exhaustive()
    }
}
