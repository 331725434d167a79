//! The periodic driver that composes Radar Client → Change Detector →
//! Store Adapter → Subscriber Hub in the nine-step priority order of
//! §4.5. Single-threaded with respect to the radar session, the change
//! detector, and the last-frame cache.
//!
//! Grounded on the legacy `src/workers/read_broadcaster.rs` single-tick
//! read→broadcast worker shape, generalized to the full
//! priority order, with fan-out unconditionally ordered before
//! persistence so store latency never gates delivery. Persistence
//! itself (step 9) is dispatched to `crate::persistence::run` over a
//! bounded queue rather than awaited inline, so a stalled store
//! connection can never stall this loop's `interval.tick()`.

use crate::metrics_sink::MetricsSink;
use crate::persistence::{PersistJob, PersistenceQueue};
use crate::radar_client::RadarClient;
use crate::state::AppState;
use radar_core::{ChangeDetector, Status};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub const POLL_COMMAND: &str = "sRN LMDradardata";

pub struct AcquisitionLoop {
    state: AppState,
    radar: RadarClient,
    detector: ChangeDetector,
    sink: Arc<dyn MetricsSink>,
    persist_queue: Arc<PersistenceQueue>,
    tick_period: Duration,
    max_consecutive_errors: u32,
    reconnect_delay: Duration,
}

impl AcquisitionLoop {
    #[must_use]
    pub fn new(
        state: AppState,
        radar: RadarClient,
        min_velocity_change: f64,
        sink: Arc<dyn MetricsSink>,
        persist_queue: Arc<PersistenceQueue>,
        tick_period: Duration,
        max_consecutive_errors: u32,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            state,
            radar,
            detector: ChangeDetector::new(min_velocity_change),
            sink,
            persist_queue,
            tick_period,
            max_consecutive_errors,
            reconnect_delay,
        }
    }

    /// Runs until `shutdown` fires. Each iteration is one tick; ticks are
    /// paced by `tick_period` except when a reconnect delay is in effect.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.tick_period);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("acquisition loop received shutdown signal");
                    self.radar.close().await;
                    return;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&mut self) {
        // Step 1: send the canonical poll command.
        let poll_result = self.radar.poll(POLL_COMMAND).await;

        let reply = match poll_result {
            Err(e) => {
                // Step 2: transport failure.
                let became_comm_failure = {
                    let mut status = self.state.status.write().await;
                    status.consecutive_errors += 1;
                    status.last_error = Some(e.to_string());
                    status.timestamp = chrono::Utc::now();
                    if status.consecutive_errors > self.max_consecutive_errors {
                        status.status = Status::CommFailure;
                        true
                    } else {
                        false
                    }
                };
                if became_comm_failure {
                    let snapshot = self.state.current_status().await;
                    warn!(error = %e, errors = snapshot.consecutive_errors, "radar comm failure threshold exceeded");
                    self.state.hub.broadcast_status(&snapshot).await;
                    self.persist_status(&snapshot).await;
                    tokio::time::sleep(self.reconnect_delay).await;
                }
                return;
            }
            Ok(reply) => reply,
        };

        // Step 3: success, possibly after prior failures.
        let status_recovered = {
            let mut status = self.state.status.write().await;
            let recovered = status.consecutive_errors > 0 || status.status != Status::Ok;
            status.consecutive_errors = 0;
            status.last_error = None;
            status.status = Status::Ok;
            status.timestamp = chrono::Utc::now();
            recovered
        };
        if status_recovered {
            let snapshot = self.state.current_status().await;
            self.state.hub.broadcast_status(&snapshot).await;
            self.persist_status(&snapshot).await;
        }

        // Step 4: decode.
        let outcome = radar_core::decode(&reply);
        for warning in &outcome.warnings {
            warn!(warning, "radar decode warning");
        }
        let mut frame = outcome.frame;

        // Step 5: obstruction override.
        if frame.positions_all_zero() {
            frame.status = Status::Obstructed;
            let mut status = self.state.status.write().await;
            if status.status != Status::Obstructed {
                status.status = Status::Obstructed;
                status.timestamp = frame.timestamp;
                drop(status);
                let snapshot = self.state.current_status().await;
                self.state.hub.broadcast_status(&snapshot).await;
                self.persist_status(&snapshot).await;
            }
        }

        // Step 6: change detection.
        let changes = self.detector.detect(&frame);

        {
            let mut last = self.state.last_frame.write().await;
            *last = Some(frame.clone());
        }
        self.state.record_velocity_samples(&frame).await;
        self.state.record_changes(&changes).await;

        // Step 7: fan-out first.
        self.state.hub.broadcast_metrics(&frame).await;
        if !changes.is_empty() {
            self.state.hub.broadcast_changes(&changes).await;
        }

        // Step 8: in-process metrics handlers (e.g. the PLC mirror).
        self.sink.notify(&frame);

        // Step 9: persist, after fan-out, never gating it. Dispatched to
        // the persistence task over a bounded, drop-oldest queue (§5) so
        // a stalled store connection can never block this tick or the
        // next interval.tick().
        let has_changes = !changes.is_empty();
        self.persist_queue.push(PersistJob::Frame(frame)).await;
        if has_changes {
            self.persist_queue.push(PersistJob::Changes(changes)).await;
        }
    }

    async fn persist_status(&self, status: &radar_core::StatusRecord) {
        self.persist_queue
            .push(PersistJob::Status {
                status: status.status,
                last_error: status.last_error.clone(),
                consecutive_errors: status.consecutive_errors,
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SubscriberHub;
    use crate::metrics_sink::NoopSink;
    use radar_test_utils::MockRadarServer;
    use std::sync::Arc;
    use store_client::{StoreClient, StoreConfig};

    async fn test_state(store: StoreClient) -> AppState {
        AppState::new(
            "test".to_owned(),
            "0.0.0".to_owned(),
            "127.0.0.1:0".to_owned(),
            Arc::new(SubscriberHub::new(16)),
            store,
            1000,
            100,
        )
    }

    fn hex_f32(value: f32) -> String {
        format!("{:08X}", value.to_bits())
    }

    #[tokio::test]
    async fn sustained_failure_sets_comm_failure_with_error_count() {
        let mock = MockRadarServer::start().await;
        for _ in 0..6 {
            mock.push_disconnect();
        }
        let store = StoreClient::connect(StoreConfig { enabled: false, ..StoreConfig::default() })
            .await
            .unwrap();
        let state = test_state(store).await;
        let radar = RadarClient::new(
            "127.0.0.1".to_owned(),
            mock.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let mut acq = AcquisitionLoop::new(
            state.clone(),
            radar,
            0.01,
            Arc::new(NoopSink),
            PersistenceQueue::new(16),
            Duration::from_millis(1),
            5,
            Duration::from_millis(1),
        );
        for _ in 0..6 {
            acq.tick().await;
        }
        let status = state.current_status().await;
        assert_eq!(status.status, Status::CommFailure);
        assert_eq!(status.consecutive_errors, 6);
    }

    #[tokio::test]
    async fn transient_disconnect_recovers_to_ok_without_comm_failure() {
        let mock = MockRadarServer::start().await;
        mock.push_disconnect();
        mock.push_disconnect();
        let reply = format!(
            "sRA LMDradardata P3DX1 {} 0 7 0064 0000 0000 0000 0000 0000 0000 V3DX1 {} 0 7 0000 0000 0000 0000 0000 0000 0000",
            hex_f32(1.0),
            hex_f32(0.01)
        );
        mock.push_reply(reply.into_bytes());

        let store = StoreClient::connect(StoreConfig { enabled: false, ..StoreConfig::default() })
            .await
            .unwrap();
        let state = test_state(store).await;
        let radar = RadarClient::new(
            "127.0.0.1".to_owned(),
            mock.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let mut acq = AcquisitionLoop::new(
            state.clone(),
            radar,
            0.01,
            Arc::new(NoopSink),
            PersistenceQueue::new(16),
            Duration::from_millis(1),
            5,
            Duration::from_millis(1),
        );
        acq.tick().await;
        acq.tick().await;
        acq.tick().await;

        let status = state.current_status().await;
        assert_eq!(status.status, Status::Ok);
        assert_eq!(status.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn all_zero_positions_flip_status_to_obstructed() {
        let mock = MockRadarServer::start().await;
        let reply = format!(
            "sRA LMDradardata P3DX1 {} 0 7 0000 0000 0000 0000 0000 0000 0000 V3DX1 {} 0 7 0000 0000 0000 0000 0000 0000 0000",
            hex_f32(1.0),
            hex_f32(0.01)
        );
        mock.push_reply(reply.into_bytes());

        let store = StoreClient::connect(StoreConfig { enabled: false, ..StoreConfig::default() })
            .await
            .unwrap();
        let state = test_state(store).await;
        let radar = RadarClient::new(
            "127.0.0.1".to_owned(),
            mock.local_addr().port(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let mut acq = AcquisitionLoop::new(
            state.clone(),
            radar,
            0.01,
            Arc::new(NoopSink),
            PersistenceQueue::new(16),
            Duration::from_millis(1),
            5,
            Duration::from_millis(1),
        );
        acq.tick().await;
        let frame = state.current_frame().await.unwrap();
        assert_eq!(frame.status, Status::Obstructed);
    }
}
