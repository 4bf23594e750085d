//! Composite execution properties

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use gemix::errors::GemixError;
use gemix::task::display::{NullRenderer, ProgressLine, Renderer};
use gemix::task::{
    Parallel, ParallelStepDisplay, Serial, StepDisplay, Task, TaskBuilder, TaskContext, TaskId,
};

use crate::mock::MockConnector;

/// Appends its index to a shared journal, optionally failing
struct Record {
    index: usize,
    fail: bool,
    delay: Duration,
    journal: Arc<Mutex<Vec<usize>>>,
    rollbacks: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Task for Record {
    async fn execute(&self, _ctx: &TaskContext) -> Result<(), GemixError> {
        tokio::time::sleep(self.delay).await;
        self.journal.lock().unwrap().push(self.index);
        if self.fail {
            return Err(GemixError::ExecutionError(format!("task {} failed", self.index)));
        }
        Ok(())
    }

    async fn rollback(&self, _ctx: &TaskContext) -> Result<(), GemixError> {
        self.rollbacks.lock().unwrap().push(self.index);
        Ok(())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record: index={}", self.index)
    }
}

struct Fixture {
    journal: Arc<Mutex<Vec<usize>>>,
    rollbacks: Arc<Mutex<Vec<usize>>>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            journal: Arc::new(Mutex::new(Vec::new())),
            rollbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn tasks(&self, count: usize, failing: &[usize]) -> Vec<Arc<dyn Task>> {
        (0..count)
            .map(|index| {
                Arc::new(Record {
                    index,
                    fail: failing.contains(&index),
                    delay: Duration::from_millis(((count - index) % 3) as u64),
                    journal: self.journal.clone(),
                    rollbacks: self.rollbacks.clone(),
                }) as Arc<dyn Task>
            })
            .collect()
    }

    fn journal(&self) -> Vec<usize> {
        self.journal.lock().unwrap().clone()
    }
}

fn context(concurrency: usize) -> TaskContext {
    TaskContext::new(
        Arc::new(MockConnector::new()),
        Arc::new(NullRenderer),
        concurrency,
    )
}

#[tokio::test]
async fn test_serial_runs_every_task_in_order() {
    let fixture = Fixture::new();
    let serial = Serial::new(fixture.tasks(6, &[]), false);

    serial.execute(&context(4)).await.unwrap();
    assert_eq!(fixture.journal(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_serial_stops_at_first_failure() {
    let fixture = Fixture::new();
    let serial = Serial::new(fixture.tasks(6, &[2]), false);

    let err = serial.execute(&context(4)).await.unwrap_err();
    assert!(matches!(err, GemixError::ExecutionError(ref m) if m == "task 2 failed"));
    assert_eq!(fixture.journal(), vec![0, 1, 2]);
}

#[tokio::test]
async fn test_serial_ignore_error_runs_everything() {
    let fixture = Fixture::new();
    let serial = Serial::new(fixture.tasks(4, &[1]), true);

    serial.execute(&context(4)).await.unwrap();
    assert_eq!(fixture.journal(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_serial_rollback_is_reversed() {
    let fixture = Fixture::new();
    let serial = Serial::new(fixture.tasks(3, &[]), false);

    serial.rollback(&context(1)).await.unwrap();
    assert_eq!(*fixture.rollbacks.lock().unwrap(), vec![2, 1, 0]);
}

#[tokio::test]
async fn test_parallel_runs_every_task_once() {
    let fixture = Fixture::new();
    let parallel = Parallel::new(fixture.tasks(10, &[]), false);

    parallel.execute(&context(3)).await.unwrap();
    let mut journal = fixture.journal();
    journal.sort_unstable();
    assert_eq!(journal, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_parallel_returns_the_single_failure() {
    let fixture = Fixture::new();
    let parallel = Parallel::new(fixture.tasks(8, &[5]), false);

    let err = parallel.execute(&context(2)).await.unwrap_err();
    assert!(matches!(err, GemixError::ExecutionError(ref m) if m == "task 5 failed"));
    assert_eq!(fixture.journal().len(), 8);
}

#[tokio::test]
async fn test_parallel_ignore_error() {
    let fixture = Fixture::new();
    let parallel = Parallel::new(fixture.tasks(5, &[0, 3]), true);

    parallel.execute(&context(2)).await.unwrap();
    assert_eq!(fixture.journal().len(), 5);
}

/// Tracks how many instances run at the same time
struct Gauge {
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Task for Gauge {
    async fn execute(&self, _ctx: &TaskContext) -> Result<(), GemixError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Display for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gauge")
    }
}

#[tokio::test]
async fn test_parallel_respects_concurrency() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<Arc<dyn Task>> = (0..12)
        .map(|_| {
            Arc::new(Gauge {
                running: running.clone(),
                peak: peak.clone(),
            }) as Arc<dyn Task>
        })
        .collect();

    Parallel::new(tasks, false).execute(&context(3)).await.unwrap();
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_builder_step_runs_in_order() {
    let fixture = Fixture::new();
    let step = fixture
        .tasks(3, &[])
        .into_iter()
        .fold(TaskBuilder::new(), |b, t| b.push_arc(t))
        .step("Three records");

    step.execute(&context(2)).await.unwrap();
    assert_eq!(fixture.journal(), vec![0, 1, 2]);
    assert_eq!(step.to_string(), "Three records");
}

#[tokio::test]
async fn test_leaf_rollback_is_unsupported() {
    let task = TaskBuilder::new().shell("10.0.0.1", "true", false).build();
    let err = task.rollback(&context(1)).await.unwrap_err();
    assert!(matches!(err, GemixError::UnsupportedRollback(_)));
}

#[test]
fn test_empty_composites_succeed() {
    let ctx = context(1);
    tokio_test::block_on(async {
        Serial::new(Vec::new(), false).execute(&ctx).await.unwrap();
        Parallel::new(Vec::new(), false).execute(&ctx).await.unwrap();
    });
}

/// Reports `messages` through the context, then succeeds
struct Talk {
    messages: Vec<&'static str>,
    hidden: AtomicBool,
}

impl Talk {
    fn new(messages: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            messages,
            hidden: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Task for Talk {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), GemixError> {
        for message in &self.messages {
            ctx.progress(*message);
        }
        Ok(())
    }

    fn set_hide_detail_display(&self, hide: bool) {
        self.hidden.store(hide, Ordering::SeqCst);
    }
}

impl fmt::Display for Talk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Talk: messages={:?}", self.messages)
    }
}

type Lines = Arc<Mutex<Vec<(String, String)>>>;

/// Keeps every progress message as `(line prefix, message)`
#[derive(Default)]
struct Recorder {
    lines: Lines,
}

struct RecordedLine {
    prefix: String,
    lines: Lines,
}

impl ProgressLine for RecordedLine {
    fn progress(&self, message: &str) {
        self.lines
            .lock()
            .unwrap()
            .push((self.prefix.clone(), message.to_string()));
    }

    fn finish(&self, _error: Option<&str>) {}
}

impl Renderer for Recorder {
    fn header(&self, _title: &str) {}

    fn line(&self, prefix: &str) -> Box<dyn ProgressLine> {
        Box::new(RecordedLine {
            prefix: prefix.to_string(),
            lines: self.lines.clone(),
        })
    }

    fn block(&self, _text: &str) {}
}

fn messages_of(lines: &Lines, prefix: &str) -> Vec<String> {
    lines
        .lock()
        .unwrap()
        .iter()
        .filter(|(p, _)| p == prefix)
        .map(|(_, m)| m.clone())
        .collect()
}

#[tokio::test]
async fn test_step_display_routes_descendant_progress_to_its_line() {
    let renderer = Arc::new(Recorder::default());
    let lines = renderer.lines.clone();
    let ctx = TaskContext::new(Arc::new(MockConnector::new()), renderer, 4);

    let first = TaskBuilder::new()
        .push_arc(Talk::new(vec!["uploaded ts-meta"]))
        .push_arc(Talk::new(vec!["uploaded install.sh"]))
        .step("Deploy 10.0.0.1");
    let second = TaskBuilder::new()
        .push_arc(Talk::new(vec!["uploaded ts-store"]))
        .step("Deploy 10.0.0.2");
    ParallelStepDisplay::new("Deploy", vec![first, second], false)
        .execute(&ctx)
        .await
        .unwrap();

    assert_eq!(
        messages_of(&lines, "Deploy 10.0.0.1"),
        vec!["uploaded ts-meta", "uploaded install.sh"]
    );
    assert_eq!(messages_of(&lines, "Deploy 10.0.0.2"), vec!["uploaded ts-store"]);
}

#[tokio::test]
async fn test_step_display_owns_only_its_subtree() {
    let inner: Arc<dyn Task> = Talk::new(vec!["inside"]);
    let foreign: Arc<dyn Task> = Talk::new(vec!["outside"]);
    let step = TaskBuilder::new().push_arc(inner.clone()).step("Step");

    assert!(step.owns(TaskId::of(&inner)));
    assert!(!step.owns(TaskId::of(&foreign)));
}

#[tokio::test]
async fn test_step_display_ignores_foreign_progress() {
    let renderer = Arc::new(Recorder::default());
    let lines = renderer.lines.clone();
    let ctx = TaskContext::new(Arc::new(MockConnector::new()), renderer, 4);

    let step: Arc<dyn Task> = Arc::new(TaskBuilder::new().push_arc(Talk::new(vec!["mine"])).step("Mine"));
    let stranger: Arc<dyn Task> = Talk::new(vec!["not mine"]);
    Parallel::new(vec![step, stranger], false)
        .execute(&ctx)
        .await
        .unwrap();

    assert_eq!(messages_of(&lines, "Mine"), vec!["mine"]);
}

#[test]
fn test_step_display_hides_nested_detail() {
    let leaf = Talk::new(vec![]);
    assert!(!leaf.hidden.load(Ordering::SeqCst));

    let nested = Arc::new(Serial::new(vec![leaf.clone() as Arc<dyn Task>], false));
    let _step = TaskBuilder::new().push_arc(nested).step("Outer");

    assert!(leaf.hidden.load(Ordering::SeqCst));
}
