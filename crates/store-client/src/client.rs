use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::{ChangeRecord, HistoryPoint, Snapshot};
use radar_core::{MetricsFrame, Status, VelocityChange, CHANNEL_COUNT};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bound on every individual Redis round trip. A stalled TCP peer fails
/// a call instead of hanging it, so a wedged connection can never block
/// a caller indefinitely (§5, §9).
const CALL_TIMEOUT: Duration = Duration::from_secs(2);

async fn with_timeout<T>(
    fut: impl Future<Output = redis::RedisResult<T>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(CALL_TIMEOUT, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(StoreError::from(e)),
        Err(_) => Err(StoreError::Timeout),
    }
}

/// Time-series store adapter mapping the data model (§3) onto a
/// Redis-compatible sorted-set store per the key layout of §4.3.
///
/// Best-effort with respect to every write: a failure marks the adapter
/// disconnected and is logged by the caller; the acquisition loop never
/// blocks fan-out on this adapter (§4.5 step 9 runs after step 7).
///
/// `ConnectionManager` is `Clone` and multiplexes internally, so this
/// type is cheaply `Clone` too: per §5, "the store adapter client [has]
/// its own internal synchronization; no external lock required". Every
/// clone shares the same underlying connection and the same connected
/// flag, so the persistence task's writer and any number of concurrent
/// HTTP/WS readers can each hold their own clone without serializing
/// behind a caller-side mutex.
#[derive(Clone)]
pub struct StoreClient {
    conn: Option<ConnectionManager>,
    config: StoreConfig,
    connected: Arc<AtomicBool>,
}

impl StoreClient {
    /// Opens a connection manager for `config`. If `config.enabled` is
    /// false, returns a client that silently no-ops every write/read,
    /// matching the "store ... enabled" configuration flag.
    pub async fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        if !config.enabled {
            return Ok(Self {
                conn: None,
                config,
                connected: Arc::new(AtomicBool::new(false)),
            });
        }
        let client = redis::Client::open(config.redis_url())
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            config,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.config.namespace, suffix)
    }

    /// Writes the current scalars and appends to each channel's history
    /// ring in a single atomic pipeline, trimming by rank to keep the
    /// highest-scored (most recent) `history_cap` entries.
    pub async fn write_frame(&mut self, frame: &MetricsFrame) -> Result<(), StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        let ts_ms = frame.timestamp.timestamp_millis();
        let cap = self.config.history_cap as isize;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(self.key("status"), frame.status.as_str());
        pipe.set(self.key("timestamp"), ts_ms);

        for i in 0..CHANNEL_COUNT {
            let pos_key = self.key(&format!("pos{}", i + 1));
            let pos_hist_key = self.key(&format!("pos{}:history", i + 1));
            pipe.set(&pos_key, frame.positions[i]);
            pipe.zadd(&pos_hist_key, frame.positions[i], ts_ms);
            pipe.zremrangebyrank(&pos_hist_key, 0, -(cap + 1));

            let vel_key = self.key(&format!("vel{}", i + 1));
            let vel_hist_key = self.key(&format!("vel{}:history", i + 1));
            pipe.set(&vel_key, frame.velocities[i]);
            pipe.zadd(&vel_hist_key, frame.velocities[i], ts_ms);
            pipe.zremrangebyrank(&vel_hist_key, 0, -(cap + 1));
        }

        match with_timeout(pipe.query_async::<()>(conn)).await {
            Ok(()) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Writes change-event detail scalars, per-channel and global indices,
    /// and bumps the per-channel counter, in a second atomic pipeline.
    pub async fn write_changes(&mut self, changes: &[VelocityChange]) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        let cap = self.config.change_log_cap as isize;

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut latest_update = Vec::with_capacity(changes.len());

        for change in changes {
            let ts_ms = change.timestamp.timestamp_millis();
            let channel = change.index + 1;
            let record = ChangeRecord {
                index: change.index,
                old_value: change.old_value,
                new_value: change.new_value,
                change_value: change.delta,
                timestamp_ms: ts_ms,
            };
            let detail_key = self.key(&format!("vel_change:{channel}:{ts_ms}"));
            let serialized =
                serde_json::to_string(&record).map_err(|e| StoreError::Command(e.to_string()))?;
            pipe.set(&detail_key, &serialized);

            let per_channel_index = self.key(&format!("vel{channel}:changes"));
            pipe.zadd(&per_channel_index, &detail_key, ts_ms);
            pipe.zremrangebyrank(&per_channel_index, 0, -(cap + 1));
            pipe.incr(self.key(&format!("vel{channel}:change_count")), 1);

            let global_index = self.key("velocity_changes");
            pipe.zadd(&global_index, &detail_key, ts_ms);
            pipe.zremrangebyrank(&global_index, 0, -(cap + 1));

            latest_update.push(record);
        }

        let serialized_latest = serde_json::to_string(&latest_update)
            .map_err(|e| StoreError::Command(e.to_string()))?;
        pipe.set(self.key("latest_update"), serialized_latest);

        match with_timeout(pipe.query_async::<()>(conn)).await {
            Ok(()) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Records the status-detail scalars independently of a frame write,
    /// used by the Acquisition Loop on status transitions (§4.5 step 2/3).
    pub async fn write_status(
        &mut self,
        status: Status,
        last_error: Option<&str>,
        consecutive_errors: u32,
    ) -> Result<(), StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.set(self.key("status"), status.as_str());
        pipe.set(self.key("consecutive_errors"), consecutive_errors);
        match last_error {
            Some(err) => {
                pipe.set(self.key("last_error"), err);
            }
            None => {
                pipe.del(self.key("last_error"));
            }
        }
        match with_timeout(pipe.query_async::<()>(conn)).await {
            Ok(()) => {
                self.connected.store(true, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Missing keys default to zero; status defaults to `unknown`.
    pub async fn get_current_snapshot(&mut self) -> Result<Snapshot, StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Disconnected);
        };
        let status_str: Option<String> = with_timeout(conn.get(self.key("status"))).await?;
        let timestamp_ms: Option<i64> = with_timeout(conn.get(self.key("timestamp"))).await?;

        let mut positions = [0.0_f64; CHANNEL_COUNT];
        let mut velocities = [0.0_f64; CHANNEL_COUNT];
        for i in 0..CHANNEL_COUNT {
            let pos: Option<f64> =
                with_timeout(conn.get(self.key(&format!("pos{}", i + 1)))).await?;
            let vel: Option<f64> =
                with_timeout(conn.get(self.key(&format!("vel{}", i + 1)))).await?;
            positions[i] = pos.unwrap_or(0.0);
            velocities[i] = vel.unwrap_or(0.0);
        }

        self.connected.store(true, Ordering::Relaxed);
        Ok(Snapshot {
            status: parse_status(status_str.as_deref()),
            timestamp_ms: timestamp_ms.unwrap_or(0),
            positions,
            velocities,
        })
    }

    /// Newest `limit` change events in descending timestamp order.
    pub async fn get_changes(&mut self, limit: usize) -> Result<Vec<ChangeRecord>, StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Disconnected);
        };
        let keys: Vec<String> = with_timeout(
            conn.zrevrange(self.key("velocity_changes"), 0, limit.max(1) as isize - 1),
        )
        .await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = with_timeout(conn.get(&key)).await?;
            if let Some(raw) = raw {
                if let Ok(record) = serde_json::from_str::<ChangeRecord>(&raw) {
                    out.push(record);
                }
            }
        }
        self.connected.store(true, Ordering::Relaxed);
        Ok(out)
    }

    /// The most recent batch of change events written by a single tick
    /// (`…:latest_update`), or empty if no changes have been written yet.
    pub async fn get_latest_update(&mut self) -> Result<Vec<ChangeRecord>, StoreError> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Disconnected);
        };
        let raw: Option<String> = with_timeout(conn.get(self.key("latest_update"))).await?;
        self.connected.store(true, Ordering::Relaxed);
        Ok(raw
            .and_then(|s| serde_json::from_str::<Vec<ChangeRecord>>(&s).ok())
            .unwrap_or_default())
    }

    /// All entries in the velocity history ring for `channel` (1-indexed),
    /// ascending timestamp order. `channel` outside `[1, 7]` is a
    /// `bad_argument`.
    pub async fn get_channel_history(
        &mut self,
        channel: usize,
    ) -> Result<Vec<HistoryPoint>, StoreError> {
        if !(1..=CHANNEL_COUNT).contains(&channel) {
            return Err(StoreError::BadArgument(format!(
                "channel must be in [1, {CHANNEL_COUNT}], got {channel}"
            )));
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(StoreError::Disconnected);
        };
        let key = self.key(&format!("vel{channel}:history"));
        let entries: Vec<(f64, f64)> =
            with_timeout(conn.zrange_withscores(&key, 0, -1)).await?;
        self.connected.store(true, Ordering::Relaxed);
        Ok(entries
            .into_iter()
            .map(|(value, score)| HistoryPoint {
                value,
                timestamp_ms: score as i64,
            })
            .collect())
    }
}

fn parse_status(raw: Option<&str>) -> Status {
    match raw {
        Some("ok") => Status::Ok,
        Some("obstructed") => Status::Obstructed,
        Some("comm_failure") => Status::CommFailure,
        Some("initializing") => Status::Initializing,
        _ => Status::Unknown,
    }
}
