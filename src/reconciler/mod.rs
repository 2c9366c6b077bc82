//! The declarative control loop for `DiagnosisTask` objects.
//!
//! Each reconcile is a pure function of the latest task state plus the
//! process-local active-agent map. The reconciler owns every status write;
//! agents reach status only through the checkpoint sink.

mod checkpoint;
mod driver;

pub use checkpoint::CheckpointWriter;
pub use driver::ControllerDriver;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentError, AgentLoop, StepSink};
use crate::llm::LlmClient;
use crate::memory::{
    format_alert_events, format_similar_findings, EmbeddingProvider, EventStore, KnowledgeFinding,
    KnowledgeStore,
};
use crate::skill::SkillRegistry;
use crate::store::{StoreError, TaskStore};
use crate::task::{DiagnosisReport, DiagnosisTask, Phase, TaskKey};
use crate::tools::{ToolRouter, ToolSet};

/// How many historically similar diagnoses are injected per run.
const SIMILAR_FINDINGS_LIMIT: usize = 3;

/// Attempts for a terminal status write before giving up. Each attempt
/// re-reads, so a conflict only costs one round trip.
const STATUS_WRITE_ATTEMPTS: usize = 3;

/// Outcome of one reconcile call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Done,
    RequeueAfter(Duration),
}

/// Tunables for agent runs.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Deadline for one agent run.
    pub agent_timeout: Duration,
    /// Step budget when the task policy does not set one.
    pub default_max_steps: usize,
    /// Recent L2 events injected per run.
    pub recent_event_limit: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(600),
            default_max_steps: 20,
            recent_event_limit: 5,
        }
    }
}

/// Owns the task state machine: starts, resumes and cancels agents, applies
/// findings through the checkpoint path, and enforces at most one running
/// agent per task identity per process.
pub struct TaskReconciler {
    store: Arc<dyn TaskStore>,
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRouter>,
    skills: Arc<SkillRegistry>,
    settings: ReconcilerSettings,

    /// Process-scoped map from task identity to the run's cancel handle.
    /// Entries are inserted at spawn and removed when the agent task exits.
    active: Arc<DashMap<String, CancellationToken>>,

    l2_store: Option<Arc<dyn EventStore>>,
    knowledge: Option<Arc<dyn KnowledgeStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl TaskReconciler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRouter>,
        skills: Arc<SkillRegistry>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            llm,
            tools,
            skills,
            settings,
            active: Arc::new(DashMap::new()),
            l2_store: None,
            knowledge: None,
            embedder: None,
        }
    }

    /// Attach an optional L2 event store for pre-run context injection.
    pub fn with_l2_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.l2_store = Some(store);
        self
    }

    /// Attach an optional L3 knowledge base plus the embedder it requires.
    pub fn with_knowledge_base(
        mut self,
        knowledge: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        self.knowledge = Some(knowledge);
        self.embedder = Some(embedder);
        self
    }

    /// Number of live agent runs in this process. Observability and tests.
    pub fn active_agent_count(&self) -> usize {
        self.active.len()
    }

    /// Cancel every live agent run. Called on driver shutdown; the runs
    /// write no terminal status, so the tasks resume on the next start.
    pub fn shutdown(&self) {
        for entry in self.active.iter() {
            entry.value().cancel();
        }
    }

    /// Drive the state machine for one task.
    pub async fn reconcile(&self, key: &TaskKey) -> Result<ReconcileAction, StoreError> {
        let Some(task) = self.store.get(key).await? else {
            // Deleted: stop any run it still owns.
            self.cancel_active(key);
            return Ok(ReconcileAction::Done);
        };

        let Some(phase) = task.status.phase else {
            // First observation: initialize the status.
            let mut init = task;
            init.status.phase = Some(Phase::Pending);
            self.store.update_status(init).await?;
            return Ok(ReconcileAction::RequeueAfter(Duration::ZERO));
        };

        match phase {
            Phase::Completed | Phase::Failed => {
                self.cancel_active(key);
                Ok(ReconcileAction::Done)
            }
            Phase::WaitingApproval => {
                if task.spec.approved {
                    self.cancel_active(key);
                    let mut resumed = task;
                    resumed.status.phase = Some(Phase::Running);
                    resumed.status.message = String::new();
                    self.store.update_status(resumed).await?;
                    Ok(ReconcileAction::RequeueAfter(Duration::ZERO))
                } else {
                    // Parked until a watch event flips spec.approved.
                    Ok(ReconcileAction::Done)
                }
            }
            Phase::Pending | Phase::Running => {
                if self.active.contains_key(&key.to_string()) {
                    return Ok(ReconcileAction::Done);
                }
                // Running without a local entry means the process restarted
                // mid-run: spawn with checkpoint restore.
                let resume = phase == Phase::Running;
                if resume {
                    tracing::info!(task = %key, "resuming interrupted task");
                }
                self.spawn_agent(task, resume).await?;
                Ok(ReconcileAction::Done)
            }
        }
    }

    fn cancel_active(&self, key: &TaskKey) {
        if let Some((_, cancel)) = self.active.remove(&key.to_string()) {
            tracing::info!(task = %key, "stopping active agent");
            cancel.cancel();
        }
    }

    async fn spawn_agent(&self, task: DiagnosisTask, resume: bool) -> Result<(), StoreError> {
        let key = task.key();
        let key_string = key.to_string();

        let skill = self.skills.match_task(&task).clone();
        tracing::info!(task = %key, skill = %skill.name, resume, "starting agent");

        // Record phase and matched skill before the run begins. On resume
        // the phase is already Running.
        let mut latest = task;
        let mut needs_write = !resume;
        if !resume {
            latest.status.phase = Some(Phase::Running);
        }
        if latest.status.matched_skill != skill.name {
            latest.status.matched_skill = skill.name.clone();
            needs_write = true;
        }
        if needs_write {
            latest = self.store.update_status(latest).await?;
        }

        let cancel = CancellationToken::new();
        self.active.insert(key_string.clone(), cancel.clone());

        let tool_set = ToolSet::new(self.tools.list_tools().await);
        let max_steps = if latest.spec.policy.max_steps > 0 {
            latest.spec.policy.max_steps
        } else {
            self.settings.default_max_steps
        };

        let sink: Arc<dyn StepSink> =
            Arc::new(CheckpointWriter::new(Arc::clone(&self.store), key.clone()));
        let agent = AgentLoop::new(
            Arc::clone(&self.llm),
            tool_set,
            max_steps,
            Some(sink),
            skill,
        );

        if !latest.status.checkpoint.is_empty() {
            agent.restore(&latest.status.checkpoint);
        }

        let goal = format!(
            "Diagnose the issue with {} {} in namespace {}.",
            latest.spec.target.kind, latest.spec.target.name, latest.spec.target.namespace
        );

        self.inject_context(&agent, &latest, &goal).await;

        let approved = latest.spec.approved;
        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let timeout = self.settings.agent_timeout;
        let knowledge = self.knowledge.clone();
        let embedder = self.embedder.clone();
        let alert_name = latest
            .spec
            .alert_context
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let namespace = latest.spec.target.namespace.clone();

        tokio::spawn(async move {
            let outcome = tokio::time::timeout(timeout, agent.run(&cancel, &goal, approved)).await;
            active.remove(&key_string);

            match outcome {
                Err(_elapsed) => {
                    tracing::warn!(task = %key, "agent run exceeded deadline");
                    apply_status(&store, &key, |t| {
                        t.status.phase = Some(Phase::Failed);
                        t.status.report = Some(DiagnosisReport {
                            root_cause: "Agent execution failed".to_string(),
                            suggestion: format!(
                                "agent run exceeded deadline ({}s)",
                                timeout.as_secs()
                            ),
                        });
                    })
                    .await;
                }
                Ok(Err(AgentError::Cancelled)) => {
                    // No terminal write: the next reconcile observes Running
                    // without a local entry and resumes.
                    tracing::info!(task = %key, "agent run cancelled");
                }
                Ok(Err(AgentError::WaitingForApproval { tool })) => {
                    tracing::info!(task = %key, %tool, "agent parked for approval");
                    apply_status(&store, &key, |t| {
                        t.status.phase = Some(Phase::WaitingApproval);
                        t.status.message = format!("Tool {tool} requires approval.");
                    })
                    .await;
                }
                Ok(Err(err)) => {
                    tracing::warn!(task = %key, error = %err, "agent run failed");
                    apply_status(&store, &key, |t| {
                        t.status.phase = Some(Phase::Failed);
                        t.status.report = Some(DiagnosisReport {
                            root_cause: "Agent execution failed".to_string(),
                            suggestion: err.to_string(),
                        });
                    })
                    .await;
                }
                Ok(Ok(result)) => {
                    tracing::info!(task = %key, "agent run completed");
                    apply_status(&store, &key, |t| {
                        t.status.phase = Some(Phase::Completed);
                        t.status.report = Some(DiagnosisReport {
                            root_cause: result.root_cause.clone(),
                            suggestion: result.suggestion.clone(),
                        });
                    })
                    .await;

                    // Fire-and-forget L3 save; diagnosis flow never blocks
                    // on the knowledge base.
                    if let (Some(knowledge), Some(embedder)) = (knowledge, embedder) {
                        let finding = KnowledgeFinding {
                            alert_name,
                            namespace,
                            root_cause: result.root_cause,
                            suggestion: result.suggestion,
                            created_at: Utc::now(),
                        };
                        tokio::spawn(async move {
                            save_to_knowledge_base(knowledge, embedder, finding).await;
                        });
                    }
                }
            }
        });

        Ok(())
    }

    /// Push L2 recent-events and L3 similar-diagnosis preambles into the
    /// agent's memory. Failures are logged and skipped; context is an
    /// enrichment, never a prerequisite.
    async fn inject_context(&self, agent: &AgentLoop, task: &DiagnosisTask, goal: &str) {
        if let Some(events) = &self.l2_store {
            let pod = if task.spec.target.kind == "Pod" {
                task.spec.target.name.as_str()
            } else {
                ""
            };
            match events
                .get_recent_events(
                    &task.spec.target.namespace,
                    pod,
                    self.settings.recent_event_limit,
                )
                .await
            {
                Ok(recent) => {
                    let msg = format_alert_events(&recent);
                    if !msg.is_empty() {
                        agent.inject_context(&msg);
                    }
                }
                Err(e) => tracing::warn!(task = %task.key(), error = %e, "l2 context lookup failed"),
            }
        }

        if let (Some(knowledge), Some(embedder)) = (&self.knowledge, &self.embedder) {
            match embedder.embed(goal).await {
                Ok(query) => match knowledge.search_similar(&query, SIMILAR_FINDINGS_LIMIT).await {
                    Ok(similar) => {
                        let msg = format_similar_findings(&similar);
                        if !msg.is_empty() {
                            agent.inject_context(&msg);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(task = %task.key(), error = %e, "l3 similarity search failed")
                    }
                },
                Err(e) => tracing::warn!(task = %task.key(), error = %e, "embedding failed"),
            }
        }
    }
}

/// Read-modify-write a task's status against the latest revision.
///
/// Terminal phases are monotone: if the task is already terminal the write
/// is skipped. Conflicts re-read and retry a bounded number of times.
async fn apply_status<F>(store: &Arc<dyn TaskStore>, key: &TaskKey, apply: F)
where
    F: Fn(&mut DiagnosisTask),
{
    for attempt in 1..=STATUS_WRITE_ATTEMPTS {
        let task = match store.get(key).await {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(e) => {
                tracing::error!(task = %key, error = %e, "failed to read task for status update");
                return;
            }
        };
        if task.is_terminal() {
            return;
        }

        let mut updated = task;
        apply(&mut updated);

        match store.update_status(updated).await {
            Ok(_) => return,
            Err(StoreError::Conflict(_)) if attempt < STATUS_WRITE_ATTEMPTS => continue,
            Err(e) => {
                tracing::error!(task = %key, error = %e, "failed to write task status");
                return;
            }
        }
    }
}

async fn save_to_knowledge_base(
    knowledge: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    finding: KnowledgeFinding,
) {
    let text = format!("{}\n{}", finding.root_cause, finding.suggestion);
    let embedding = match embedder.embed(&text).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "l3: embedding for save failed");
            return;
        }
    };
    if let Err(e) = knowledge.save_diagnosis(finding, embedding).await {
        tracing::warn!(error = %e, "l3: failed to save diagnosis");
    }
}
