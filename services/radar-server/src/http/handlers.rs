//! Read-only request/response endpoints (§6, §4.7).
//!
//! Grounded on `services/server/src/http/reads.rs`'s extractor style
//! (`Query` with defaults-via-fn) and `response.rs`'s shared error
//! envelope helpers.

use super::response::{bad_request, store_unavailable, HttpResponse};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use radar_core::{Status, CHANNEL_COUNT};
use radar_protocol::{
    ChangesResponse, DiscoverResponse, HealthResponse, HistoryResponse, HistorySample,
    InfoResponse, SnapshotResponse, StatusResponse, VelocityChangeEntry,
};

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.current_status().await;
    let acquisition_ok = matches!(status.status, Status::Ok | Status::Obstructed);
    let store_ok = state.store.is_connected();
    let overall = if acquisition_ok && store_ok { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: overall.to_owned(),
        acquisition: if acquisition_ok { "ok".to_owned() } else { "degraded".to_owned() },
        store: if store_ok { "ok".to_owned() } else { "degraded".to_owned() },
        subscribers: state.hub.len().await,
        advertiser: if state.advertiser_ok() { "ok".to_owned() } else { "degraded".to_owned() },
    })
    .into_response()
}

pub async fn info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        name: state.name.to_string(),
        version: state.version.to_string(),
        address: state.listen_addr.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        connection_count: state.hub.len().await,
    })
    .into_response()
}

pub async fn discover(State(state): State<AppState>) -> impl IntoResponse {
    let (host, port) = split_listen_addr(&state.listen_addr);
    Json(DiscoverResponse {
        name: state.name.to_string(),
        ip: host.clone(),
        port,
        ws_url: format!("ws://{host}:{port}/ws"),
        api_url: format!("http://{host}:{port}/api"),
        version: state.version.to_string(),
        ws_endpoint: "/ws".to_owned(),
        api_endpoint: "/api".to_owned(),
    })
    .into_response()
}

fn split_listen_addr(listen_addr: &str) -> (String, u16) {
    match listen_addr.rsplit_once(':') {
        Some((host, port)) => {
            let host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
            (host.to_owned(), port.parse().unwrap_or(0))
        }
        None => (listen_addr.to_owned(), 0),
    }
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let record = state.current_status().await;
    Json(StatusResponse {
        status: record.status.as_str().to_owned(),
        timestamp: record.timestamp.timestamp_millis(),
        last_error: record.last_error,
        consecutive_errors: record.consecutive_errors,
    })
    .into_response()
}

/// `GET /api/current` — prefers the store's snapshot; falls back to the
/// in-memory last frame when the store is unavailable, per §7 ("the
/// surface then falls back to an in-memory snapshot where available").
/// When neither is available (the store is down and no frame has been
/// acquired yet), returns `store_unavailable` rather than fabricating a
/// zeroed snapshot.
pub async fn current(State(mut state): State<AppState>) -> HttpResponse {
    let store_result = state.store.get_current_snapshot().await;
    match store_result {
        Ok(snapshot) => Json(SnapshotResponse {
            status: snapshot.status.as_str().to_owned(),
            timestamp: snapshot.timestamp_ms,
            positions: snapshot.positions.to_vec(),
            velocities: snapshot.velocities.to_vec(),
        })
        .into_response(),
        Err(store_err) => match state.current_frame().await {
            Some(frame) => Json(SnapshotResponse {
                status: frame.status.as_str().to_owned(),
                timestamp: frame.timestamp.timestamp_millis(),
                positions: frame.positions.to_vec(),
                velocities: frame.velocities.to_vec(),
            })
            .into_response(),
            None => store_unavailable(format!(
                "store unavailable and no frame acquired yet: {store_err}"
            )),
        },
    }
}

/// Falls back to the in-memory mirror on store unavailability, per §7
/// ("the surface then falls back to an in-memory snapshot where
/// available") — extended here beyond `/api/current` to the change log.
pub async fn velocity_changes(State(mut state): State<AppState>) -> HttpResponse {
    match state.store.get_changes(50).await {
        Ok(changes) => Json(ChangesResponse { changes: changes.into_iter().map(to_wire).collect() }).into_response(),
        Err(_) => Json(ChangesResponse {
            changes: state.recent_changes_snapshot(50).await.into_iter().map(to_wire).collect(),
        })
        .into_response(),
    }
}

pub async fn latest_update(State(mut state): State<AppState>) -> HttpResponse {
    match state.store.get_latest_update().await {
        Ok(changes) => Json(ChangesResponse { changes: changes.into_iter().map(to_wire).collect() }).into_response(),
        Err(_) => Json(ChangesResponse {
            changes: state.latest_update_snapshot().await.into_iter().map(to_wire).collect(),
        })
        .into_response(),
    }
}

/// `GET /api/velocity-history/{n}`; `n` is 1-based per §4.3/§6.
pub async fn velocity_history(
    State(mut state): State<AppState>,
    Path(n): Path<usize>,
) -> HttpResponse {
    if !(1..=CHANNEL_COUNT).contains(&n) {
        return bad_request(format!("channel must be in [1, {CHANNEL_COUNT}], got {n}"));
    }
    match state.store.get_channel_history(n).await {
        Ok(points) => Json(HistoryResponse {
            index: n,
            history: points
                .into_iter()
                .map(|p| HistorySample { value: p.value, timestamp: p.timestamp_ms })
                .collect(),
        })
        .into_response(),
        Err(_) => {
            let history = state
                .channel_history_snapshot(n)
                .await
                .unwrap_or_default()
                .into_iter()
                .map(|p| HistorySample { value: p.value, timestamp: p.timestamp_ms })
                .collect();
            Json(HistoryResponse { index: n, history }).into_response()
        }
    }
}

fn to_wire(r: store_client::ChangeRecord) -> VelocityChangeEntry {
    VelocityChangeEntry {
        index: r.index,
        old_value: r.old_value,
        new_value: r.new_value,
        change_value: r.change_value,
        timestamp: r.timestamp_ms,
    }
}
