//! The reconciler's per-step commit path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::StepSink;
use crate::store::TaskStore;
use crate::task::{Finding, TaskKey};

/// Persists findings and history lines against the latest task revision.
///
/// Each step re-reads before appending, so a lost write only drops that
/// step's history line; `checkpoint` is the authoritative record and the
/// next step's commit sees the merged state. Conflicts are logged, not
/// retried.
pub struct CheckpointWriter {
    store: Arc<dyn TaskStore>,
    key: TaskKey,
}

impl CheckpointWriter {
    pub fn new(store: Arc<dyn TaskStore>, key: TaskKey) -> Self {
        Self { store, key }
    }
}

#[async_trait]
impl StepSink for CheckpointWriter {
    async fn on_step(&self, finding: Option<&Finding>, history_entry: &str) {
        let latest = match self.store.get(&self.key).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::warn!(task = %self.key, "task vanished during checkpoint update");
                return;
            }
            Err(e) => {
                tracing::error!(task = %self.key, error = %e, "failed to read task for checkpoint");
                return;
            }
        };

        let mut task = latest;
        if let Some(f) = finding {
            task.status.checkpoint.push(f.clone());
        }
        if !history_entry.is_empty() {
            task.status.history.push(history_entry.to_string());
        }

        if let Err(e) = self.store.update_status(task).await {
            tracing::warn!(task = %self.key, error = %e, "checkpoint commit lost");
        }
    }
}
