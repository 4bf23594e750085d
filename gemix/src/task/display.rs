//! Progress-reporting decorators

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use tokio::sync::{broadcast, oneshot};

use crate::errors::GemixError;
use crate::task::{descendant_ids, Parallel, Task, TaskContext, TaskEvent, TaskId};

/// Draws progress for the display decorators
pub trait Renderer: Send + Sync {
    /// Print a section title
    fn header(&self, title: &str);

    /// Start a progress line for one step
    fn line(&self, prefix: &str) -> Box<dyn ProgressLine>;

    /// Print a pre-formatted block such as a status table
    fn block(&self, text: &str);
}

/// One progress line
pub trait ProgressLine: Send + Sync {
    fn progress(&self, message: &str);
    fn finish(&self, error: Option<&str>);
}

/// Plain line-oriented terminal output
#[derive(Debug, Default, Clone)]
pub struct TerminalRenderer;

impl Renderer for TerminalRenderer {
    fn header(&self, title: &str) {
        println!("+ {}", title.bold());
    }

    fn line(&self, prefix: &str) -> Box<dyn ProgressLine> {
        println!("  - {} ...", prefix);
        Box::new(TerminalLine {
            prefix: prefix.to_string(),
        })
    }

    fn block(&self, text: &str) {
        println!("{}", text);
    }
}

struct TerminalLine {
    prefix: String,
}

impl ProgressLine for TerminalLine {
    fn progress(&self, message: &str) {
        println!("  - {} ... {}", self.prefix, message.dimmed());
    }

    fn finish(&self, error: Option<&str>) {
        match error {
            None => println!("  - {} ... {}", self.prefix, "Done".green()),
            Some(e) => println!("  - {} ... {} {}", self.prefix, "Error".red(), e),
        }
    }
}

/// Renderer that draws nothing
#[derive(Debug, Default, Clone)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn header(&self, _title: &str) {}

    fn line(&self, _prefix: &str) -> Box<dyn ProgressLine> {
        Box::new(NullLine)
    }

    fn block(&self, _text: &str) {}
}

struct NullLine;

impl ProgressLine for NullLine {
    fn progress(&self, _message: &str) {}
    fn finish(&self, _error: Option<&str>) {}
}

/// Wraps a subtree with a single progress line.
///
/// Only progress events from tasks inside the wrapped subtree are shown.
pub struct StepDisplay {
    prefix: String,
    inner: Arc<dyn Task>,
    owned: Arc<HashSet<TaskId>>,
}

impl StepDisplay {
    pub fn new(prefix: impl Into<String>, inner: Arc<dyn Task>) -> Self {
        inner.set_hide_detail_display(true);

        let mut owned = HashSet::new();
        owned.insert(TaskId::of(&inner));
        descendant_ids(&inner, &mut owned);

        Self {
            prefix: prefix.into(),
            inner,
            owned: Arc::new(owned),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether progress from `id` is rendered by this step
    pub fn owns(&self, id: TaskId) -> bool {
        self.owned.contains(&id)
    }
}

async fn forward_progress(
    mut rx: broadcast::Receiver<TaskEvent>,
    owned: Arc<HashSet<TaskId>>,
    line: Arc<dyn ProgressLine>,
    mut done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Ok(TaskEvent::Progress { id, message }) if owned.contains(&id) => {
                    line.progress(&message);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            },
            _ = &mut done => return,
        }
    }
}

#[async_trait]
impl Task for StepDisplay {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        let line: Arc<dyn ProgressLine> = Arc::from(ctx.renderer().line(&self.prefix));
        let rx = ctx.events().subscribe();
        let (done_tx, done_rx) = oneshot::channel();
        let listener = tokio::spawn(forward_progress(rx, self.owned.clone(), line.clone(), done_rx));

        let id = TaskId::of(&self.inner);
        ctx.events().publish(TaskEvent::Begin { id });
        let result = self.inner.execute(&ctx.with_task(id)).await;
        ctx.events().publish(TaskEvent::Finish {
            id,
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        let _ = done_tx.send(());
        let _ = listener.await;

        let message = result.as_ref().err().map(|e| e.to_string());
        line.finish(message.as_deref());
        result
    }

    async fn rollback(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        self.inner.rollback(ctx).await
    }

    fn children(&self) -> &[Arc<dyn Task>] {
        std::slice::from_ref(&self.inner)
    }
}

impl fmt::Display for StepDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}

/// One progress line per child, children run concurrently.
///
/// Typically each child is a per-host pipeline wrapped in a [`StepDisplay`].
pub struct ParallelStepDisplay {
    prefix: String,
    inner: Arc<dyn Task>,
}

impl ParallelStepDisplay {
    pub fn new(prefix: impl Into<String>, steps: Vec<StepDisplay>, ignore_error: bool) -> Self {
        let children: Vec<Arc<dyn Task>> = steps
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn Task>)
            .collect();
        let inner: Arc<dyn Task> = Arc::new(Parallel::new(children, ignore_error));
        inner.set_hide_detail_display(true);
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

#[async_trait]
impl Task for ParallelStepDisplay {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        ctx.renderer().header(&self.prefix);
        let id = TaskId::of(&self.inner);
        self.inner.execute(&ctx.with_task(id)).await
    }

    async fn rollback(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        self.inner.rollback(ctx).await
    }

    fn children(&self) -> &[Arc<dyn Task>] {
        std::slice::from_ref(&self.inner)
    }
}

impl fmt::Display for ParallelStepDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)
    }
}
