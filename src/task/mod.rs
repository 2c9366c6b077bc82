//! The declarative `DiagnosisTask` data model.
//!
//! A task's `spec` is user-owned and immutable during execution except for
//! `approved`; its `status` is reconciler-owned. The persisted `checkpoint`
//! is the sole cross-restart state of an agent run.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully-qualified task identity within the control store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub namespace: String,
    pub name: String,
}

impl TaskKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Object metadata carried by every stored task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    /// Monotonic revision used for optimistic-concurrency writes.
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(&self.namespace, &self.name)
    }
}

/// The workload a diagnosis targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisTarget {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Execution policy knobs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisPolicy {
    /// Step budget for one agent run. Zero means "use the configured
    /// default".
    #[serde(default)]
    pub max_steps: usize,
}

/// Alert context captured when a task was materialized from an alert group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertContext {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// User-owned half of the task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisTaskSpec {
    pub target: DiagnosisTarget,
    #[serde(default)]
    pub policy: DiagnosisPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_context: Option<AlertContext>,
    /// Gate for `HighRisk` tools. Flipping this to `true` resumes a task
    /// parked in `WaitingApproval`.
    #[serde(default)]
    pub approved: bool,
}

/// Lifecycle phase of a task.
///
/// `Completed` and `Failed` are terminal: once reached, the status is never
/// mutated again. `WaitingApproval` is reachable only from `Running` and
/// returns to `Running` only when `spec.approved` becomes true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Pending,
    Running,
    WaitingApproval,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::WaitingApproval => "WaitingApproval",
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// The record of one tool observation in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-indexed step within a contiguous run. Resets after a resume;
    /// consumers needing strict ordering use append order.
    pub step: usize,
    pub tool_name: String,
    /// The JSON argument string as the LLM produced it.
    pub tool_args: String,
    /// Tool output truncated to 200 characters.
    pub summary: String,
    /// RFC3339 timestamp of the observation.
    pub timestamp: String,
}

/// Final outcome of a diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisReport {
    pub root_cause: String,
    pub suggestion: String,
}

/// Reconciler-owned half of the task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosisTaskStatus {
    /// `None` until the first reconcile writes `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default)]
    pub matched_skill: String,
    /// Append-only within a run; never truncated on resume.
    #[serde(default)]
    pub checkpoint: Vec<Finding>,
    /// Advisory trace of the run. May lose entries under write conflicts;
    /// agent logic must never depend on it.
    #[serde(default)]
    pub history: Vec<String>,
    /// Set exactly once, at the terminal transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<DiagnosisReport>,
    #[serde(default)]
    pub message: String,
}

/// The declarative unit of work, durable in the control store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisTask {
    pub metadata: ObjectMeta,
    pub spec: DiagnosisTaskSpec,
    #[serde(default)]
    pub status: DiagnosisTaskStatus,
}

impl DiagnosisTask {
    /// Create a task with an empty status.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: DiagnosisTaskSpec) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                resource_version: 0,
            },
            spec,
            status: DiagnosisTaskStatus::default(),
        }
    }

    pub fn key(&self) -> TaskKey {
        self.metadata.key()
    }

    /// Whether the task has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.status.phase.map(|p| p.is_terminal()).unwrap_or(false)
    }
}
