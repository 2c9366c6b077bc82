//! The watch-driven reconcile loop.
//!
//! Subscribes to the store's change stream, funnels keys through a serial
//! work queue, and calls the reconciler for each. Errors re-queue with
//! exponential backoff; `RequeueAfter` schedules a delayed re-run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::store::TaskStore;
use crate::task::TaskKey;

use super::{ReconcileAction, TaskReconciler};

const BASE_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Drives [`TaskReconciler::reconcile`] from store watch events.
pub struct ControllerDriver {
    reconciler: Arc<TaskReconciler>,
    store: Arc<dyn TaskStore>,
}

impl ControllerDriver {
    pub fn new(reconciler: Arc<TaskReconciler>, store: Arc<dyn TaskStore>) -> Self {
        Self { reconciler, store }
    }

    /// Run until cancelled. On shutdown every live agent is cancelled; the
    /// affected tasks resume from their checkpoints on the next start.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut watch = self.store.watch();
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<TaskKey>();

        // Seed with existing tasks so runs interrupted by a restart resume
        // without waiting for a fresh event.
        self.enqueue_all(&queue_tx).await;

        let mut failures: HashMap<TaskKey, u32> = HashMap::new();

        tracing::info!("task controller started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("task controller stopping");
                    self.reconciler.shutdown();
                    return;
                }
                event = watch.recv() => match event {
                    Ok(key) => {
                        let _ = queue_tx.send(key);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "watch stream lagged; re-listing tasks");
                        self.enqueue_all(&queue_tx).await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("watch stream closed; stopping controller");
                        self.reconciler.shutdown();
                        return;
                    }
                },
                Some(key) = queue_rx.recv() => {
                    match self.reconciler.reconcile(&key).await {
                        Ok(ReconcileAction::Done) => {
                            failures.remove(&key);
                        }
                        Ok(ReconcileAction::RequeueAfter(delay)) => {
                            failures.remove(&key);
                            requeue(&queue_tx, key, delay);
                        }
                        Err(e) => {
                            let attempt = failures.entry(key.clone()).or_insert(0);
                            *attempt += 1;
                            let delay = backoff_delay(*attempt);
                            tracing::warn!(
                                task = %key,
                                error = %e,
                                attempt = *attempt,
                                ?delay,
                                "reconcile failed; backing off"
                            );
                            requeue(&queue_tx, key, delay);
                        }
                    }
                }
            }
        }
    }

    async fn enqueue_all(&self, queue_tx: &mpsc::UnboundedSender<TaskKey>) {
        match self.store.list().await {
            Ok(tasks) => {
                for task in tasks {
                    let _ = queue_tx.send(task.key());
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to list tasks for seeding"),
        }
    }
}

fn requeue(queue_tx: &mpsc::UnboundedSender<TaskKey>, key: TaskKey, delay: Duration) {
    if delay.is_zero() {
        let _ = queue_tx.send(key);
        return;
    }
    let tx = queue_tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(key);
    });
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    BASE_BACKOFF
        .saturating_mul(2u32.saturating_pow(exp))
        .min(MAX_BACKOFF)
}
