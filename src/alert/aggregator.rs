//! Sliding-window alert deduplication.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::memory::{AlertEvent, EventStore};

use super::creator::TaskCreator;
use super::types::{AlertGroup, AlertItem, GroupKey};

/// Deduplicates and merges incoming alerts within a sliding time window,
/// then creates a single `DiagnosisTask` per group when the window expires.
///
/// The window is anchored on `last_seen`: repeated alerts extend the group,
/// a silent group expires. Ingest is a pure in-memory update; all I/O
/// happens in the sweep, after the lock is released.
pub struct Aggregator {
    groups: Mutex<HashMap<GroupKey, AlertGroup>>,
    window_size: Duration,
    sweep_interval: Duration,
    creator: TaskCreator,
    /// Optional L2 event store. When set, each flushed group is written as
    /// an `AlertEvent` so agents can query recent context.
    l2_store: Option<Arc<dyn EventStore>>,
}

impl Aggregator {
    pub fn new(creator: TaskCreator, window_size: Duration, sweep_interval: Duration) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            window_size,
            sweep_interval,
            creator,
            l2_store: None,
        }
    }

    /// Attach an optional L2 event store. Call before [`Aggregator::run`].
    pub fn with_l2_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.l2_store = Some(store);
        self
    }

    /// Accept a single alert item. Thread-safe; performs no I/O.
    pub fn ingest(&self, item: &AlertItem) -> anyhow::Result<()> {
        let key = GroupKey::from_labels(&item.labels);
        let now = Utc::now();

        let mut groups = self
            .groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let group = groups.entry(key.clone()).or_insert_with(|| AlertGroup {
            key: key.clone(),
            merged_labels: HashMap::new(),
            alert_name: item.labels.get("alertname").cloned().unwrap_or_default(),
            namespace: item.labels.get("namespace").cloned().unwrap_or_default(),
            pod: item.labels.get("pod").cloned().unwrap_or_default(),
            first_seen: now,
            last_seen: now,
            count: 0,
        });

        // Label merge: later alerts overwrite earlier ones.
        for (k, v) in &item.labels {
            group.merged_labels.insert(k.clone(), v.clone());
        }

        // Bump the sliding-window anchor and counter.
        group.last_seen = now;
        group.count += 1;

        tracing::debug!(key = %key, count = group.count, "alert ingested");
        Ok(())
    }

    /// Number of active alert groups. Used for observability and tests.
    pub fn group_count(&self) -> usize {
        self.groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Drive the periodic sweep until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            window = ?self.window_size,
            sweep = ?self.sweep_interval,
            "alert aggregator started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("alert aggregator stopped");
                    return;
                }
                _ = ticker.tick() => self.sweep().await,
            }
        }
    }

    /// Flush groups whose `last_seen` exceeds the window.
    ///
    /// Expired groups are collected and removed under the lock; task
    /// creation happens after release so ingest is never blocked on I/O.
    async fn sweep(&self) {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.window_size).unwrap_or(chrono::Duration::MAX);

        let expired: Vec<AlertGroup> = {
            let mut groups = self
                .groups
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let expired_keys: Vec<GroupKey> = groups
                .iter()
                .filter(|(_, g)| now - g.last_seen > window)
                .map(|(k, _)| k.clone())
                .collect();
            expired_keys
                .into_iter()
                .filter_map(|k| groups.remove(&k))
                .collect()
        };

        for group in expired {
            if let Err(e) = self.flush(&group).await {
                // The group is already gone from the map; the underlying
                // alert source is expected to re-fire.
                tracing::error!(
                    key = %group.key,
                    alert = %group.alert_name,
                    count = group.count,
                    error = %e,
                    "failed to flush alert group"
                );
            }
        }
    }

    async fn flush(&self, group: &AlertGroup) -> anyhow::Result<()> {
        tracing::info!(
            key = %group.key,
            alert = %group.alert_name,
            count = group.count,
            "flushing alert group"
        );

        self.creator.create(group).await?;

        tracing::info!(key = %group.key, "DiagnosisTask created for alert group");

        // L2 write is async and best-effort; task creation is never blocked
        // on it.
        if let Some(store) = &self.l2_store {
            let store = Arc::clone(store);
            let event = AlertEvent {
                alert_name: group.alert_name.clone(),
                namespace: group.namespace.clone(),
                pod: group.pod.clone(),
                count: group.count,
                first_seen: group.first_seen,
                last_seen: group.last_seen,
            };
            tokio::spawn(async move {
                if let Err(e) = store.append_alert_event(event).await {
                    tracing::error!(error = %e, "l2: failed to append alert event");
                }
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryEventStore;
    use crate::store::{MemoryTaskStore, TaskStore};
    use crate::task::DiagnosisTask;
    use std::collections::HashMap;

    const WINDOW: Duration = Duration::from_millis(80);
    const SWEEP: Duration = Duration::from_millis(10);

    fn firing(labels: &[(&str, &str)]) -> AlertItem {
        AlertItem {
            status: "firing".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn new_aggregator(window: Duration, sweep: Duration) -> (Arc<Aggregator>, Arc<MemoryTaskStore>) {
        let store = Arc::new(MemoryTaskStore::new());
        let creator = TaskCreator::new(store.clone(), "default");
        (Arc::new(Aggregator::new(creator, window, sweep)), store)
    }

    fn spawn_sweeper(agg: &Arc<Aggregator>) -> CancellationToken {
        let cancel = CancellationToken::new();
        let agg = Arc::clone(agg);
        let token = cancel.clone();
        tokio::spawn(async move { agg.run(token).await });
        cancel
    }

    async fn wait_for_tasks(
        store: &Arc<MemoryTaskStore>,
        want: usize,
        deadline: Duration,
    ) -> Vec<DiagnosisTask> {
        let end = tokio::time::Instant::now() + deadline;
        loop {
            let tasks = store.list().await.expect("list");
            if tasks.len() == want {
                return tasks;
            }
            if tokio::time::Instant::now() >= end {
                panic!("timed out waiting for {want} tasks; got {}", tasks.len());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn single_alert_creates_one_task() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
            ("severity", "critical"),
        ]))
        .expect("ingest");

        let tasks = wait_for_tasks(&store, 1, Duration::from_millis(300)).await;
        let ctx = tasks[0].spec.alert_context.as_ref().expect("alert context");
        assert_eq!(ctx.name, "KubePodCrashLooping");
        cancel.cancel();
    }

    #[tokio::test]
    async fn duplicate_alerts_deduplicate_to_one_task() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        let item = firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
        ]);
        for _ in 0..3 {
            agg.ingest(&item).expect("ingest");
        }

        wait_for_tasks(&store, 1, Duration::from_millis(300)).await;
        assert_eq!(agg.group_count(), 0, "groups must drain after flush");
        cancel.cancel();
    }

    #[tokio::test]
    async fn different_pods_flush_separate_tasks() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        for pod in ["nginx-a", "nginx-b"] {
            agg.ingest(&firing(&[
                ("alertname", "KubePodCrashLooping"),
                ("namespace", "default"),
                ("pod", pod),
            ]))
            .expect("ingest");
        }

        wait_for_tasks(&store, 2, Duration::from_millis(300)).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn different_namespaces_never_merge() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        for ns in ["default", "payments"] {
            agg.ingest(&firing(&[
                ("alertname", "KubePodCrashLooping"),
                ("namespace", ns),
                ("pod", "nginx-abc"),
            ]))
            .expect("ingest");
        }

        assert_eq!(agg.group_count(), 2);
        wait_for_tasks(&store, 2, Duration::from_millis(300)).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn labels_merge_last_writer_wins() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
            ("severity", "warning"),
        ]))
        .expect("ingest");
        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
            ("severity", "critical"),
        ]))
        .expect("ingest");

        let tasks = wait_for_tasks(&store, 1, Duration::from_millis(300)).await;
        let ctx = tasks[0].spec.alert_context.as_ref().expect("alert context");
        assert_eq!(ctx.labels["severity"], "critical");
        cancel.cancel();
    }

    #[tokio::test]
    async fn no_flush_before_window_expires() {
        let (agg, store) = new_aggregator(Duration::from_millis(200), SWEEP);
        let cancel = spawn_sweeper(&agg);

        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
        ]))
        .expect("ingest");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.list().await.expect("list").len(), 0);
        cancel.cancel();
    }

    #[tokio::test]
    async fn window_is_anchored_on_last_seen() {
        let window = Duration::from_millis(120);
        let (agg, store) = new_aggregator(window, SWEEP);
        let cancel = spawn_sweeper(&agg);

        let item = firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
        ]);

        // Ingest at t=0, then again at t=w/2 to push the anchor forward.
        agg.ingest(&item).expect("ingest");
        tokio::time::sleep(window / 2).await;
        agg.ingest(&item).expect("ingest");

        // At t=w the group is still inside the (reset) window.
        tokio::time::sleep(window / 2).await;
        assert_eq!(
            store.list().await.expect("list").len(),
            0,
            "window must reset on new ingest"
        );

        wait_for_tasks(&store, 1, Duration::from_millis(400)).await;
        cancel.cancel();
    }

    #[tokio::test]
    async fn flushed_group_writes_l2_event() {
        let store = Arc::new(MemoryTaskStore::new());
        let events = Arc::new(InMemoryEventStore::new());
        let creator = TaskCreator::new(store.clone(), "default");
        let agg = Arc::new(
            Aggregator::new(creator, WINDOW, SWEEP).with_l2_store(events.clone()),
        );
        let cancel = spawn_sweeper(&agg);

        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
        ]))
        .expect("ingest");
        agg.ingest(&firing(&[
            ("alertname", "KubePodCrashLooping"),
            ("namespace", "default"),
            ("pod", "nginx-abc"),
        ]))
        .expect("ingest");

        wait_for_tasks(&store, 1, Duration::from_millis(300)).await;

        // The L2 write is fired on a separate task; give it a beat.
        let end = tokio::time::Instant::now() + Duration::from_millis(200);
        loop {
            let recent = events
                .get_recent_events("default", "", 10)
                .await
                .expect("events");
            if !recent.is_empty() {
                assert_eq!(recent[0].alert_name, "KubePodCrashLooping");
                assert_eq!(recent[0].count, 2);
                break;
            }
            if tokio::time::Instant::now() >= end {
                panic!("l2 event never appeared");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn cancel_stops_the_sweep_loop() {
        let (agg, _store) = new_aggregator(WINDOW, SWEEP);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let agg2 = Arc::clone(&agg);
        let handle = tokio::spawn(async move { agg2.run(token).await });

        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("run() must return after cancel")
            .expect("join");
    }

    #[tokio::test]
    async fn empty_label_values_merge_verbatim() {
        let (agg, store) = new_aggregator(WINDOW, SWEEP);
        let cancel = spawn_sweeper(&agg);

        let labels = HashMap::from([
            ("alertname".to_string(), "A".to_string()),
            ("namespace".to_string(), "default".to_string()),
            ("pod".to_string(), "p".to_string()),
            ("team".to_string(), String::new()),
        ]);
        agg.ingest(&AlertItem {
            status: "firing".to_string(),
            labels,
            ..Default::default()
        })
        .expect("ingest");

        let tasks = wait_for_tasks(&store, 1, Duration::from_millis(300)).await;
        let ctx = tasks[0].spec.alert_context.as_ref().expect("alert context");
        assert_eq!(ctx.labels.get("team"), Some(&String::new()));
        cancel.cancel();
    }
}
