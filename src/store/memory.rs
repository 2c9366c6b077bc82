//! In-process task store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::task::{DiagnosisTask, TaskKey};

use super::{StoreError, TaskStore};

const WATCH_CHANNEL_CAPACITY: usize = 256;

/// In-memory [`TaskStore`] with optimistic concurrency and watch support.
pub struct MemoryTaskStore {
    tasks: RwLock<HashMap<TaskKey, DiagnosisTask>>,
    watch_tx: broadcast::Sender<TaskKey>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        let (watch_tx, _) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        Self {
            tasks: RwLock::new(HashMap::new()),
            watch_tx,
        }
    }

    fn notify(&self, key: TaskKey) {
        // No receivers is fine; watch is best-effort for idle stores.
        let _ = self.watch_tx.send(key);
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn get(&self, key: &TaskKey) -> Result<Option<DiagnosisTask>, StoreError> {
        Ok(self.tasks.read().await.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<DiagnosisTask>, StoreError> {
        Ok(self.tasks.read().await.values().cloned().collect())
    }

    async fn create(&self, mut task: DiagnosisTask) -> Result<DiagnosisTask, StoreError> {
        let key = task.key();
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&key) {
            return Err(StoreError::already_exists(&key));
        }
        task.metadata.resource_version = 1;
        tasks.insert(key.clone(), task.clone());
        drop(tasks);
        self.notify(key);
        Ok(task)
    }

    async fn update_spec(&self, task: DiagnosisTask) -> Result<DiagnosisTask, StoreError> {
        let key = task.key();
        let mut tasks = self.tasks.write().await;
        let stored = tasks.get_mut(&key).ok_or_else(|| StoreError::not_found(&key))?;
        if stored.metadata.resource_version != task.metadata.resource_version {
            return Err(StoreError::conflict(&key));
        }
        stored.spec = task.spec;
        stored.metadata.resource_version += 1;
        let updated = stored.clone();
        drop(tasks);
        self.notify(key);
        Ok(updated)
    }

    async fn update_status(&self, task: DiagnosisTask) -> Result<DiagnosisTask, StoreError> {
        let key = task.key();
        let mut tasks = self.tasks.write().await;
        let stored = tasks.get_mut(&key).ok_or_else(|| StoreError::not_found(&key))?;
        if stored.metadata.resource_version != task.metadata.resource_version {
            return Err(StoreError::conflict(&key));
        }
        stored.status = task.status;
        stored.metadata.resource_version += 1;
        let updated = stored.clone();
        drop(tasks);
        self.notify(key);
        Ok(updated)
    }

    async fn delete(&self, key: &TaskKey) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.remove(key).is_none() {
            return Err(StoreError::not_found(key));
        }
        drop(tasks);
        self.notify(key.clone());
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<TaskKey> {
        self.watch_tx.subscribe()
    }
}
