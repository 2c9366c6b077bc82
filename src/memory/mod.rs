//! Long-lived memory contracts for the agent.
//!
//! The conversation record (working memory) lives in [`crate::agent`]. This
//! module defines the two optional external stores consulted before a run:
//!
//! - **L2 event store**: a recent-events stream of flushed alert groups,
//!   keyed by namespace. Gives the agent awareness of what else has been
//!   firing nearby.
//! - **L3 knowledge store**: a similarity index over past diagnoses. Gives
//!   the agent access to historically similar root causes.
//!
//! Both are contracts; the in-memory implementations in [`inmem`] serve
//! single-binary deployments and tests, while clustered backends plug in
//! behind the same traits.

mod inmem;

pub use inmem::{InMemoryEventStore, InMemoryKnowledgeStore};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One flushed alert group, as recorded in the L2 stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub alert_name: String,
    pub namespace: String,
    pub pod: String,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Recent-events stream keyed by namespace.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_alert_event(&self, event: AlertEvent) -> anyhow::Result<()>;

    /// Most recent events for a namespace, newest first. A non-empty `pod`
    /// filters to that pod.
    async fn get_recent_events(
        &self,
        namespace: &str,
        pod: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<AlertEvent>>;
}

/// One completed diagnosis, as stored in the L3 index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeFinding {
    pub alert_name: String,
    pub namespace: String,
    pub root_cause: String,
    pub suggestion: String,
    pub created_at: DateTime<Utc>,
}

/// Similarity index over past diagnoses.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Prepare backing storage. Idempotent; safe to call on every startup.
    async fn init_schema(&self) -> anyhow::Result<()>;

    async fn save_diagnosis(
        &self,
        finding: KnowledgeFinding,
        embedding: Vec<f32>,
    ) -> anyhow::Result<()>;

    /// The `limit` diagnoses closest to `query`, ascending by distance.
    /// An empty query returns an empty result without error.
    async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<KnowledgeFinding>>;
}

/// Dense-vector text embedding, used only when an L3 store is configured.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Format recent alert events for injection into the agent's context.
/// Returns an empty string when there is nothing to inject.
pub fn format_alert_events(events: &[AlertEvent]) -> String {
    if events.is_empty() {
        return String::new();
    }
    let mut b = String::from("Recent alert events in this namespace (from L2 event stream):\n");
    for e in events {
        b.push_str(&format!(
            "  - [{}] pod={} count={} last_seen={}\n",
            e.alert_name,
            e.pod,
            e.count,
            e.last_seen.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    b
}

/// Format historically similar diagnoses for injection into the agent's
/// context. Returns an empty string when there is nothing to inject.
pub fn format_similar_findings(findings: &[KnowledgeFinding]) -> String {
    if findings.is_empty() {
        return String::new();
    }
    let mut b = String::from("Historically similar diagnoses (from L3 knowledge base):\n");
    for (i, f) in findings.iter().enumerate() {
        b.push_str(&format!(
            "  [{}] alert={} namespace={} root_cause={} suggestion={} (recorded {})\n",
            i + 1,
            f.alert_name,
            f.namespace,
            f.root_cause,
            f.suggestion,
            f.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str, pod: &str) -> AlertEvent {
        AlertEvent {
            alert_name: name.to_string(),
            namespace: "default".to_string(),
            pod: pod.to_string(),
            count: 3,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn format_events_empty_is_empty() {
        assert_eq!(format_alert_events(&[]), "");
    }

    #[test]
    fn format_events_lists_each_alert() {
        let out = format_alert_events(&[event("KubePodCrashLooping", "nginx-a")]);
        assert!(out.starts_with("Recent alert events"));
        assert!(out.contains("[KubePodCrashLooping] pod=nginx-a count=3"));
    }

    #[test]
    fn format_findings_empty_is_empty() {
        assert_eq!(format_similar_findings(&[]), "");
    }

    #[test]
    fn format_findings_numbers_entries() {
        let out = format_similar_findings(&[KnowledgeFinding {
            alert_name: "KubePodOOM".to_string(),
            namespace: "default".to_string(),
            root_cause: "limit too low".to_string(),
            suggestion: "raise limit".to_string(),
            created_at: Utc::now(),
        }]);
        assert!(out.contains("[1] alert=KubePodOOM"));
        assert!(out.contains("root_cause=limit too low"));
    }
}
