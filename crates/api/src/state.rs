use std::collections::HashMap;
use std::sync::Arc;

use studio_pipeline::executor::TaskExecutor;
use studio_pipeline::layout::DataDir;
use studio_pipeline::runner::WorkflowRunner;
use studio_pipeline::store::ExperimentStore;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything inside is behind an `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Persisted runs under `config.data_dir`.
    pub store: ExperimentStore,
    pub runner: Arc<WorkflowRunner>,
    pub run_locks: RunLocks,
}

impl AppState {
    pub fn new(config: ServerConfig, executor: Arc<dyn TaskExecutor>) -> Self {
        let data = DataDir::new(&config.data_dir);
        Self {
            store: ExperimentStore::new(data.clone()),
            runner: Arc::new(WorkflowRunner::new(data, executor)),
            run_locks: RunLocks::default(),
            config: Arc::new(config),
        }
    }
}

/// One async mutex per run, serializing read-modify-write of its
/// experiment file within this process.
///
/// Entries live only while some request holds or awaits them.
#[derive(Clone, Default)]
pub struct RunLocks {
    inner: Arc<Mutex<HashMap<(String, String), Arc<Mutex<()>>>>>,
}

impl RunLocks {
    pub async fn lock(&self, workspace_id: &str, unique_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            // The map holds the only reference to an idle entry.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((workspace_id.to_string(), unique_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_run_is_serialized() {
        let locks = RunLocks::default();
        let guard = locks.lock("1", "r1").await;

        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.lock("1", "r1")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_secs(1), locks.lock("1", "r1")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = RunLocks::default();
        for uid in ["a", "b", "c", "missing"] {
            drop(locks.lock("1", uid).await);
        }
        assert_eq!(locks.len().await, 1);

        let held = locks.lock("1", "x").await;
        drop(locks.lock("1", "y").await);
        assert_eq!(locks.len().await, 2);
        drop(held);
    }

    #[tokio::test]
    async fn different_runs_do_not_block() {
        let locks = RunLocks::default();
        let _a = locks.lock("1", "r1").await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock("1", "r2")).await;
        assert!(b.is_ok());
    }
}
