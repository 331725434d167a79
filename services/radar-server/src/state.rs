//! Shared application state, handed to the HTTP/WS layer and updated by
//! the Acquisition Loop. Grounded on `services/server/src/state.rs`'s
//! `Arc<RwLock<...>>`-per-concern `AppState` shape.

use crate::hub::SharedHub;
use radar_core::{MetricsFrame, Ring, StatusRecord, VelocityChange, CHANNEL_COUNT};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use store_client::{ChangeRecord, HistoryPoint, StoreClient};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub name: Arc<str>,
    pub version: Arc<str>,
    pub listen_addr: Arc<str>,
    pub started_at: Instant,
    pub hub: SharedHub,
    pub status: Arc<RwLock<StatusRecord>>,
    /// Last successfully decoded frame, for HTTP fallback reads and the
    /// welcome-time initial snapshot. `None` until the first tick.
    pub last_frame: Arc<RwLock<Option<MetricsFrame>>>,
    /// Per §5, "the store adapter client [has] its own internal
    /// synchronization; no external lock required" — `StoreClient` is
    /// cheaply `Clone` and every clone shares the same underlying Redis
    /// connection, so HTTP/WS reads never serialize behind the
    /// persistence task's writes.
    pub store: StoreClient,
    pub advertiser_ok: Arc<AtomicBool>,
    /// In-memory mirror of the global change index, bounded the same way
    /// as `…:velocity_changes` (§4.3). Backs the `/api/velocity-changes`
    /// and realtime history fallback when the store is unavailable (§7:
    /// "falls back to an in-memory snapshot where available").
    recent_changes: Arc<RwLock<Ring<ChangeRecord>>>,
    /// In-memory mirror of each channel's `…:velN:history` ring.
    channel_histories: Arc<RwLock<Vec<Ring<HistoryPoint>>>>,
    /// In-memory mirror of `…:latest_update` — the most recent change batch.
    latest_update: Arc<RwLock<Vec<ChangeRecord>>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        name: String,
        version: String,
        listen_addr: String,
        hub: SharedHub,
        store: StoreClient,
        history_cap: usize,
        change_log_cap: usize,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            listen_addr: listen_addr.into(),
            started_at: Instant::now(),
            hub,
            status: Arc::new(RwLock::new(StatusRecord::initial(chrono::Utc::now()))),
            last_frame: Arc::new(RwLock::new(None)),
            store,
            advertiser_ok: Arc::new(AtomicBool::new(false)),
            recent_changes: Arc::new(RwLock::new(Ring::new(change_log_cap))),
            channel_histories: Arc::new(RwLock::new(
                (0..CHANNEL_COUNT).map(|_| Ring::new(history_cap)).collect(),
            )),
            latest_update: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn mark_advertiser(&self, ok: bool) {
        self.advertiser_ok.store(ok, Ordering::Relaxed);
    }

    #[must_use]
    pub fn advertiser_ok(&self) -> bool {
        self.advertiser_ok.load(Ordering::Relaxed)
    }

    pub async fn current_status(&self) -> StatusRecord {
        self.status.read().await.clone()
    }

    pub async fn current_frame(&self) -> Option<MetricsFrame> {
        self.last_frame.read().await.clone()
    }

    /// Mirrors one tick's velocity samples into the per-channel in-memory
    /// rings, called unconditionally (step 6/7 of §4.5), independent of
    /// whether any change event was detected.
    pub async fn record_velocity_samples(&self, frame: &MetricsFrame) {
        let ts_ms = frame.timestamp.timestamp_millis();
        let mut histories = self.channel_histories.write().await;
        for (i, ring) in histories.iter_mut().enumerate() {
            ring.push(HistoryPoint { value: frame.velocities[i], timestamp_ms: ts_ms });
        }
    }

    /// Mirrors one tick's change batch into the global in-memory index and
    /// the `latest_update` slot. A no-op for an empty batch, matching the
    /// store adapter's own "`latest_update`... most recent batch" contract.
    pub async fn record_changes(&self, changes: &[VelocityChange]) {
        if changes.is_empty() {
            return;
        }
        let records: Vec<ChangeRecord> = changes.iter().map(to_change_record).collect();
        {
            let mut recent = self.recent_changes.write().await;
            for record in &records {
                recent.push(record.clone());
            }
        }
        *self.latest_update.write().await = records;
    }

    /// Newest `limit` in-memory change records, descending by timestamp —
    /// the fallback counterpart of `StoreClient::get_changes`.
    pub async fn recent_changes_snapshot(&self, limit: usize) -> Vec<ChangeRecord> {
        let recent = self.recent_changes.read().await;
        let mut all: Vec<ChangeRecord> = recent.iter().cloned().collect();
        all.reverse();
        all.truncate(limit);
        all
    }

    /// The in-memory mirror of `…:latest_update`.
    pub async fn latest_update_snapshot(&self) -> Vec<ChangeRecord> {
        self.latest_update.read().await.clone()
    }

    /// `channel` is 1-based, matching `StoreClient::get_channel_history`.
    /// Returns `None` for an out-of-range channel.
    pub async fn channel_history_snapshot(&self, channel: usize) -> Option<Vec<HistoryPoint>> {
        if !(1..=CHANNEL_COUNT).contains(&channel) {
            return None;
        }
        let histories = self.channel_histories.read().await;
        Some(histories[channel - 1].iter().copied().collect())
    }
}

fn to_change_record(change: &VelocityChange) -> ChangeRecord {
    ChangeRecord {
        index: change.index,
        old_value: change.old_value,
        new_value: change.new_value,
        change_value: change.delta,
        timestamp_ms: change.timestamp.timestamp_millis(),
    }
}
