//! The declarative task store contract.
//!
//! Any backing store must provide per-object optimistic concurrency, unique
//! names within a namespace, and change notification (watch). The in-process
//! [`MemoryTaskStore`] satisfies the contract for single-binary deployments
//! and tests; a cluster-backed store plugs in behind the same trait.

mod memory;

pub use memory::MemoryTaskStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::task::{DiagnosisTask, TaskKey};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("task {0} already exists")]
    AlreadyExists(TaskKeyString),

    #[error("task {0} not found")]
    NotFound(TaskKeyString),

    #[error("conflict writing task {0}: object was modified")]
    Conflict(TaskKeyString),
}

/// Owned display form of a key, so errors stay `Clone` and cheap.
pub type TaskKeyString = String;

impl StoreError {
    pub fn already_exists(key: &TaskKey) -> Self {
        StoreError::AlreadyExists(key.to_string())
    }

    pub fn not_found(key: &TaskKey) -> Self {
        StoreError::NotFound(key.to_string())
    }

    pub fn conflict(key: &TaskKey) -> Self {
        StoreError::Conflict(key.to_string())
    }
}

/// Durable store for `DiagnosisTask` objects with watch semantics.
///
/// `update_spec` and `update_status` are optimistic: the write is accepted
/// only when the caller's `metadata.resource_version` matches the stored
/// revision, otherwise [`StoreError::Conflict`] is returned and the caller
/// re-reads.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, key: &TaskKey) -> Result<Option<DiagnosisTask>, StoreError>;

    async fn list(&self) -> Result<Vec<DiagnosisTask>, StoreError>;

    /// Create a new task. The name must be unique within its namespace.
    async fn create(&self, task: DiagnosisTask) -> Result<DiagnosisTask, StoreError>;

    /// Replace the spec of an existing task, leaving status untouched.
    async fn update_spec(&self, task: DiagnosisTask) -> Result<DiagnosisTask, StoreError>;

    /// Replace the status of an existing task, leaving spec untouched.
    async fn update_status(&self, task: DiagnosisTask) -> Result<DiagnosisTask, StoreError>;

    async fn delete(&self, key: &TaskKey) -> Result<(), StoreError>;

    /// Subscribe to change notifications. Every create, update, and delete
    /// emits the affected key.
    fn watch(&self) -> broadcast::Receiver<TaskKey>;
}
