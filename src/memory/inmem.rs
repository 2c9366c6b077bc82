//! In-process L2/L3 store implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{AlertEvent, EventStore, KnowledgeFinding, KnowledgeStore};

/// Max entries retained per namespace stream.
const DEFAULT_STREAM_CAP: usize = 500;

/// Bounded per-namespace event ring.
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, VecDeque<AlertEvent>>>,
    cap: usize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STREAM_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            cap,
        }
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append_alert_event(&self, event: AlertEvent) -> anyhow::Result<()> {
        let mut streams = self
            .streams
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let stream = streams.entry(event.namespace.clone()).or_default();
        stream.push_back(event);
        while stream.len() > self.cap {
            stream.pop_front();
        }
        Ok(())
    }

    async fn get_recent_events(
        &self,
        namespace: &str,
        pod: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<AlertEvent>> {
        let streams = self
            .streams
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(stream) = streams.get(namespace) else {
            return Ok(Vec::new());
        };
        Ok(stream
            .iter()
            .rev()
            .filter(|e| pod.is_empty() || e.pod == pod)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Linear-scan cosine-distance similarity index.
pub struct InMemoryKnowledgeStore {
    rows: RwLock<Vec<(KnowledgeFinding, Vec<f32>)>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryKnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn init_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn save_diagnosis(
        &self,
        finding: KnowledgeFinding,
        embedding: Vec<f32>,
    ) -> anyhow::Result<()> {
        self.rows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((finding, embedding));
        Ok(())
    }

    async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
    ) -> anyhow::Result<Vec<KnowledgeFinding>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .rows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut scored: Vec<(f32, KnowledgeFinding)> = rows
            .iter()
            .filter(|(_, emb)| !emb.is_empty())
            .map(|(f, emb)| (cosine_distance(query, emb), f.clone()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored.into_iter().take(limit).map(|(_, f)| f).collect())
    }
}

/// Cosine distance in `[0, 2]`; vectors of unequal length or zero norm are
/// treated as maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 2.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
