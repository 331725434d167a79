//! Subscriber Hub: registry of realtime subscribers with non-blocking
//! fan-out, per-frame coalescing, and slow-consumer eviction.
//!
//! Grounded on `local_fanout.rs`'s per-consumer broadcast-or-drop shape
//! and `services/server/src/state.rs`'s `Arc<RwLock<HashMap<...>>>`
//! registry pattern, generalized from a byte broadcast to a tagged
//! message union with per-subscriber bounded mpsc queues (so a full queue
//! can be detected synchronously and the subscriber evicted, rather than
//! relying on a lagging `broadcast::Receiver`).

use radar_core::{MetricsFrame, StatusRecord, VelocityChange, CHANNEL_COUNT};
use radar_protocol::{
    error_codes, Envelope, ErrorMessage, ErrorPayload, HistorySample, Metrics, Ping, Pong,
    StatusMessage, VelocityChangeEntry, VelocityChanges, VelocityHistory, Welcome, WsMessage,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Minimum interval between unsuppressed metrics broadcasts, per §4.4's
/// coalescing predicate.
const COALESCE_INTERVAL: Duration = Duration::from_millis(50);
/// Velocity delta (m/s) that forces delivery even inside the coalescing
/// window.
const COALESCE_FORCE_DELTA: f64 = 0.05;
/// Cadence of the hub-wide liveness ping broadcast.
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

pub struct Subscriber {
    pub id: Uuid,
    tx: mpsc::Sender<String>,
    pub remote_addr: String,
}

struct CoalesceState {
    last_sent_at: Option<tokio::time::Instant>,
    last_sent_velocities: [f64; CHANNEL_COUNT],
}

pub struct SubscriberHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    queue_capacity: usize,
    coalesce: RwLock<CoalesceState>,
}

impl SubscriberHub {
    #[must_use]
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity,
            coalesce: RwLock::new(CoalesceState {
                last_sent_at: None,
                last_sent_velocities: [0.0; CHANNEL_COUNT],
            }),
        }
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Registers a new outbound channel, sends the welcome message, and
    /// returns the receiver half for the caller's write task to drain.
    pub async fn admit(&self, remote_addr: String) -> (Uuid, mpsc::Receiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                id,
                tx,
                remote_addr,
            },
        );
        info!(subscriber = %id, "subscriber admitted");
        self.send_to(id, WsMessage::Welcome(Welcome { client_id: id.to_string() }))
            .await;
        (id, rx)
    }

    /// Idempotent: dropping the subscriber's sender closes its channel,
    /// which the per-subscriber write task observes and tears down on.
    pub async fn evict(&self, id: Uuid) {
        if self.subscribers.write().await.remove(&id).is_some() {
            info!(subscriber = %id, "subscriber evicted");
        }
    }

    async fn send_to(&self, id: Uuid, message: WsMessage) {
        let Some(tx) = self.subscribers.read().await.get(&id).map(|s| s.tx.clone()) else {
            return;
        };
        let Ok(json) = serde_json::to_string(&Envelope::new(message, now_ms())) else {
            return;
        };
        if tx.try_send(json).is_err() {
            self.evict(id).await;
        }
    }

    /// Enqueues `message` on every subscriber; any subscriber whose queue
    /// is full is evicted. Eviction happens after the broadcast pass so a
    /// slow consumer never blocks delivery to the rest, and the read lock
    /// is released before any write-locking eviction occurs.
    async fn broadcast_unconditional(&self, message: &WsMessage) {
        let json = match serde_json::to_string(&Envelope::new(message.clone(), now_ms())) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize broadcast message");
                return;
            }
        };
        let mut to_evict = Vec::new();
        {
            let subs = self.subscribers.read().await;
            for sub in subs.values() {
                if sub.tx.try_send(json.clone()).is_err() {
                    to_evict.push(sub.id);
                }
            }
        }
        for id in to_evict {
            self.evict(id).await;
        }
    }

    /// Broadcasts one metrics frame, subject to the dual time-and-magnitude
    /// coalescing predicate: suppressed only if both less than
    /// `COALESCE_INTERVAL` elapsed since the last send *and* no channel
    /// moved by more than `COALESCE_FORCE_DELTA`.
    pub async fn broadcast_metrics(&self, frame: &MetricsFrame) {
        let now = tokio::time::Instant::now();
        let should_send = {
            let state = self.coalesce.read().await;
            match state.last_sent_at {
                None => true,
                Some(last) => {
                    let elapsed = now.saturating_duration_since(last);
                    let forced = (0..CHANNEL_COUNT).any(|i| {
                        (frame.velocities[i] - state.last_sent_velocities[i]).abs()
                            > COALESCE_FORCE_DELTA
                    });
                    elapsed >= COALESCE_INTERVAL || forced
                }
            }
        };
        if !should_send {
            debug!("metrics broadcast suppressed by coalescing policy");
            return;
        }
        {
            let mut state = self.coalesce.write().await;
            state.last_sent_at = Some(now);
            state.last_sent_velocities = frame.velocities;
        }
        self.broadcast_unconditional(&WsMessage::Metrics(Metrics {
            positions: frame.positions.to_vec(),
            velocities: frame.velocities.to_vec(),
            status: frame.status.as_str().to_owned(),
        }))
        .await;
    }

    /// Sends the current snapshot unconditionally, bypassing coalescing —
    /// used on admission so a new subscriber sees state immediately.
    pub async fn send_initial_snapshot(&self, id: Uuid, frame: &MetricsFrame) {
        self.send_to(
            id,
            WsMessage::Metrics(Metrics {
                positions: frame.positions.to_vec(),
                velocities: frame.velocities.to_vec(),
                status: frame.status.as_str().to_owned(),
            }),
        )
        .await;
    }

    pub async fn broadcast_changes(&self, changes: &[VelocityChange]) {
        if changes.is_empty() {
            return;
        }
        let entries = changes.iter().map(to_wire_change).collect();
        self.broadcast_unconditional(&WsMessage::VelocityChanges(VelocityChanges { changes: entries }))
            .await;
    }

    pub async fn broadcast_status(&self, status: &StatusRecord) {
        self.broadcast_unconditional(&WsMessage::Status(StatusMessage {
            status: status.status.as_str().to_owned(),
            last_error: status.last_error.clone(),
            error_count: Some(status.consecutive_errors),
        }))
        .await;
    }

    pub async fn broadcast_ping(&self) {
        self.broadcast_unconditional(&WsMessage::Ping(Ping { time: now_ms() }))
            .await;
    }

    pub async fn send_pong(&self, id: Uuid, client_time: i64) {
        self.send_to(
            id,
            WsMessage::Pong(Pong {
                time: client_time,
                server_time: now_ms(),
            }),
        )
        .await;
    }

    pub async fn send_status(&self, id: Uuid, status: &StatusRecord) {
        self.send_to(
            id,
            WsMessage::Status(StatusMessage {
                status: status.status.as_str().to_owned(),
                last_error: status.last_error.clone(),
                error_count: Some(status.consecutive_errors),
            }),
        )
        .await;
    }

    pub async fn send_history(&self, id: Uuid, index: usize, history: Vec<HistorySample>) {
        self.send_to(id, WsMessage::VelocityHistory(VelocityHistory { index, history }))
            .await;
    }

    pub async fn send_error(&self, id: Uuid, code: &str, message: &str) {
        self.send_to(
            id,
            WsMessage::Error(ErrorMessage {
                error: message.to_owned(),
                data: ErrorPayload { code: code.to_owned() },
            }),
        )
        .await;
    }

    /// Closes every subscriber's channel as part of shutdown; the
    /// per-subscriber write task observes the closed channel and tears
    /// the transport down.
    pub async fn close_all(&self) {
        let mut subs = self.subscribers.write().await;
        subs.clear();
    }
}

fn to_wire_change(change: &VelocityChange) -> VelocityChangeEntry {
    VelocityChangeEntry {
        index: change.index,
        old_value: change.old_value,
        new_value: change.new_value,
        change_value: change.delta,
        timestamp: change.timestamp.timestamp_millis(),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Validates a `get_history` command's channel index. The realtime
/// protocol's indices are 0-based (matching `VelocityChangeEntry.index`,
/// GLOSSARY's `[0,6]`), unlike the HTTP surface's 1-based `{n}` path
/// segment (§6, §4.3).
pub fn validate_history_index(index: usize) -> Result<usize, (&'static str, String)> {
    if index >= CHANNEL_COUNT {
        return Err((
            error_codes::BAD_ARGUMENT,
            format!("channel index must be in [0, {}], got {index}", CHANNEL_COUNT - 1),
        ));
    }
    Ok(index)
}

pub type SharedHub = Arc<SubscriberHub>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use radar_core::Status;

    fn frame(velocities: [f64; CHANNEL_COUNT]) -> MetricsFrame {
        MetricsFrame {
            timestamp: Utc::now(),
            positions: [0.0; CHANNEL_COUNT],
            velocities,
            status: Status::Ok,
        }
    }

    #[tokio::test]
    async fn admit_sends_welcome_first() {
        let hub = SubscriberHub::new(8);
        let (id, mut rx) = hub.admit("127.0.0.1:1".to_owned()).await;
        let raw = rx.recv().await.unwrap();
        let env: Envelope = serde_json::from_str(&raw).unwrap();
        match env.message {
            WsMessage::Welcome(w) => assert_eq!(w.client_id, id.to_string()),
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_subscriber_is_evicted_without_affecting_others() {
        let hub = SubscriberHub::new(2);
        let (slow_id, _slow_rx_keep_open_but_unread) = hub.admit("slow".to_owned()).await;
        let (fast_id, mut fast_rx) = hub.admit("fast".to_owned()).await;
        // Drain fast's welcome.
        fast_rx.recv().await.unwrap();

        for i in 0..5 {
            hub.broadcast_status(&StatusRecord {
                status: Status::Ok,
                timestamp: Utc::now(),
                last_error: None,
                consecutive_errors: 0,
                connection_descriptor: None,
            })
            .await;
            let _ = i;
        }

        assert_eq!(hub.len().await, 1);
        assert!(fast_rx.recv().await.is_some());
        assert!(hub.subscribers.read().await.contains_key(&fast_id));
        assert!(!hub.subscribers.read().await.contains_key(&slow_id));
    }

    #[tokio::test]
    async fn coalescing_suppresses_small_fast_changes_but_not_large_ones() {
        let hub = SubscriberHub::new(8);
        let (_id, mut rx) = hub.admit("s".to_owned()).await;
        rx.recv().await.unwrap(); // welcome

        hub.broadcast_metrics(&frame([0.0; CHANNEL_COUNT])).await;
        rx.recv().await.unwrap(); // first send always goes through

        hub.broadcast_metrics(&frame([0.01; CHANNEL_COUNT])).await;
        assert!(rx.try_recv().is_err(), "small delta within window should be suppressed");

        let mut big = [0.0; CHANNEL_COUNT];
        big[3] = 1.0;
        hub.broadcast_metrics(&frame(big)).await;
        assert!(rx.try_recv().is_ok(), "large delta should force delivery");
    }

    #[test]
    fn history_index_rejects_out_of_range() {
        assert!(validate_history_index(0).is_ok());
        assert!(validate_history_index(7).is_err());
        assert!(validate_history_index(3).is_ok());
    }
}
