//! Persistence dispatch: decouples the Acquisition Loop's tick cadence
//! from Redis write latency.
//!
//! §4.5 step 9 "dispatch[es]" persistence after fan-out, never gating
//! it, and §5's back-pressure contract is explicit: "Loop → persistence:
//! asynchronous with a bounded channel; if full, the oldest pending
//! batch is dropped and a warning is logged." A plain bounded
//! `tokio::sync::mpsc` channel can't express drop-the-oldest from the
//! sender side — the sender has no access to the receiver's queue — so
//! this is a small dedicated ring guarded by a `Notify`, in the same
//! oldest-evicted spirit as `radar_core::Ring`.

use radar_core::{MetricsFrame, Status, VelocityChange};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use store_client::StoreClient;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::time::Instant;
use tracing::warn;

/// Default bound on the number of pending persistence jobs.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
/// Grace period given to drain the queue on shutdown before giving up.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// One unit of work dispatched from the Acquisition Loop to the
/// persistence task.
pub enum PersistJob {
    Frame(MetricsFrame),
    Changes(Vec<VelocityChange>),
    Status { status: Status, last_error: Option<String>, consecutive_errors: u32 },
}

/// Bounded, drop-oldest-when-full queue from the Acquisition Loop to the
/// persistence task.
pub struct PersistenceQueue {
    jobs: Mutex<VecDeque<PersistJob>>,
    capacity: usize,
    notify: Notify,
}

impl PersistenceQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        })
    }

    /// Never blocks the caller on a full queue: drops the oldest pending
    /// job and logs a warning instead, per §5.
    pub async fn push(&self, job: PersistJob) {
        let mut jobs = self.jobs.lock().await;
        if jobs.len() >= self.capacity {
            jobs.pop_front();
            warn!(capacity = self.capacity, "persistence queue full; dropping oldest pending batch");
        }
        jobs.push_back(job);
        drop(jobs);
        self.notify.notify_one();
    }

    async fn pop(&self) -> PersistJob {
        loop {
            if let Some(job) = self.jobs.lock().await.pop_front() {
                return job;
            }
            self.notify.notified().await;
        }
    }

    async fn pop_now(&self) -> Option<PersistJob> {
        self.jobs.lock().await.pop_front()
    }
}

/// Applies `job` to `store`, logging (never propagating) any failure —
/// a store write is always best-effort (§7).
async fn apply(store: &mut StoreClient, job: PersistJob) {
    let result = match job {
        PersistJob::Frame(frame) => store.write_frame(&frame).await,
        PersistJob::Changes(changes) => store.write_changes(&changes).await,
        PersistJob::Status { status, last_error, consecutive_errors } => {
            store.write_status(status, last_error.as_deref(), consecutive_errors).await
        }
    };
    if let Err(e) = result {
        warn!(error = %e, "persistence job failed");
    }
}

/// Runs until `shutdown` fires, applying queued jobs to `store` as they
/// arrive. On shutdown, drains whatever remains under a bounded grace
/// period instead of dropping it immediately.
pub async fn run(queue: Arc<PersistenceQueue>, mut store: StoreClient, mut shutdown: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                drain(&queue, &mut store).await;
                return;
            }
            job = queue.pop() => {
                apply(&mut store, job).await;
            }
        }
    }
}

async fn drain(queue: &PersistenceQueue, store: &mut StoreClient) {
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    loop {
        if Instant::now() >= deadline {
            warn!("persistence drain grace period exceeded; remaining jobs dropped");
            return;
        }
        match queue.pop_now().await {
            Some(job) => apply(store, job).await,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use store_client::StoreConfig;

    async fn disabled_store() -> StoreClient {
        StoreClient::connect(StoreConfig { enabled: false, ..StoreConfig::default() }).await.unwrap()
    }

    #[tokio::test]
    async fn push_past_capacity_drops_oldest() {
        let queue = PersistenceQueue::new(2);
        queue.push(PersistJob::Status { status: Status::Ok, last_error: None, consecutive_errors: 0 }).await;
        queue
            .push(PersistJob::Status { status: Status::Obstructed, last_error: None, consecutive_errors: 1 })
            .await;
        queue
            .push(PersistJob::Status { status: Status::CommFailure, last_error: None, consecutive_errors: 2 })
            .await;

        let first = queue.pop().await;
        let PersistJob::Status { status, .. } = first else { panic!("expected status job") };
        assert_eq!(status, Status::Obstructed, "oldest (Ok) job should have been dropped");

        let second = queue.pop().await;
        let PersistJob::Status { status, .. } = second else { panic!("expected status job") };
        assert_eq!(status, Status::CommFailure);
    }

    #[tokio::test]
    async fn run_applies_jobs_until_shutdown() {
        let queue = PersistenceQueue::new(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let store = disabled_store().await;

        let handle = tokio::spawn(run(queue.clone(), store, shutdown_rx));

        queue.push(PersistJob::Frame(MetricsFrame::zeroed(Utc::now()))).await;
        let _ = shutdown_tx.send(());

        tokio::time::timeout(Duration::from_secs(1), handle).await.expect("task join").unwrap();
    }
}
