//! Host-keyed executor table

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::errors::GemixError;
use crate::executor::Executor;

/// Executors keyed by host IP.
///
/// Filled by the connect stage of an operation; later stages only read it.
#[derive(Default, Clone)]
pub struct ExecutorPool {
    inner: Arc<RwLock<HashMap<String, Arc<dyn Executor>>>>,
}

impl ExecutorPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the executor for `host`, replacing any previous one
    pub async fn insert(&self, host: &str, executor: Arc<dyn Executor>) {
        self.inner.write().await.insert(host.to_string(), executor);
    }

    /// Executor for `host`, or a connection error if the host was never connected
    pub async fn get(&self, host: &str) -> Result<Arc<dyn Executor>, GemixError> {
        self.inner
            .read()
            .await
            .get(host)
            .cloned()
            .ok_or_else(|| GemixError::ConnectionError(format!("no session for host {}", host)))
    }

    pub async fn contains(&self, host: &str) -> bool {
        self.inner.read().await.contains_key(host)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl std::fmt::Debug for ExecutorPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorPool").finish_non_exhaustive()
    }
}
