//! Converts expired alert groups into `DiagnosisTask` objects.

use std::sync::Arc;

use chrono::Utc;

use crate::store::{StoreError, TaskStore};
use crate::task::{
    AlertContext, DiagnosisTarget, DiagnosisTask, DiagnosisTaskSpec,
};
use crate::util::sanitize_name;

const MAX_ALERT_NAME_SEGMENT: usize = 40;

/// Builds and persists one task per flushed alert group.
pub struct TaskCreator {
    store: Arc<dyn TaskStore>,
    /// Namespace in which tasks are created.
    namespace: String,
}

impl TaskCreator {
    pub fn new(store: Arc<dyn TaskStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// Create a task for an alert group. Idempotent: an already-exists
    /// failure is treated as success so retried alerts never error.
    pub async fn create(&self, group: &super::AlertGroup) -> Result<(), StoreError> {
        let task = self.build_task(group);
        match self.store.create(task).await {
            Ok(_) => Ok(()),
            Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn build_task(&self, group: &super::AlertGroup) -> DiagnosisTask {
        let name = self.build_task_name(&group.alert_name);
        let target = self.build_target(group);

        DiagnosisTask::new(
            &self.namespace,
            name,
            DiagnosisTaskSpec {
                target,
                alert_context: Some(AlertContext {
                    name: group.alert_name.clone(),
                    labels: group.merged_labels.clone(),
                }),
                ..Default::default()
            },
        )
    }

    /// Pod-level alerts target the pod; everything else targets the
    /// namespace (falling back to the configured namespace when the alert
    /// carried none).
    fn build_target(&self, group: &super::AlertGroup) -> DiagnosisTarget {
        if !group.pod.is_empty() {
            return DiagnosisTarget {
                kind: "Pod".to_string(),
                namespace: group.namespace.clone(),
                name: group.pod.clone(),
            };
        }

        let ns = if group.namespace.is_empty() {
            self.namespace.clone()
        } else {
            group.namespace.clone()
        };
        DiagnosisTarget {
            kind: "Namespace".to_string(),
            namespace: ns.clone(),
            name: ns,
        }
    }

    /// Format: `alert-<sanitized-alertname>-<unix-ms>`.
    fn build_task_name(&self, alert_name: &str) -> String {
        let mut safe = sanitize_name(alert_name, MAX_ALERT_NAME_SEGMENT);
        if safe.is_empty() {
            safe = "unknown".to_string();
        }
        format!("alert-{}-{}", safe, Utc::now().timestamp_millis())
    }
}
