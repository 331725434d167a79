// radar-protocol: realtime subscriber wire types and HTTP response DTOs.
//
// All WebSocket messages use a top-level `type` field for discriminated
// deserialization, matching the subscriber protocol's own wire contract
// ("Every message has `type`"). The enum variants map 1:1 to the
// server-originated and client-originated message kinds.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// A single velocity-change event as carried over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityChangeEntry {
    pub index: usize,
    pub old_value: f64,
    pub new_value: f64,
    pub change_value: f64,
    pub timestamp: i64,
}

/// One sample in a per-channel history reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub value: f64,
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Server -> subscriber messages
// ---------------------------------------------------------------------------

/// Sent immediately on admission, carrying the subscriber's assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub client_id: String,
}

/// One metrics frame, broadcast per tick (subject to coalescing).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
    pub status: String,
}

/// A batch of velocity-change events for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityChanges {
    pub changes: Vec<VelocityChangeEntry>,
}

/// Acquisition/connection status, broadcast on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u32>,
}

/// Reply to a `get_history` command: the full ring for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityHistory {
    pub index: usize,
    pub history: Vec<HistorySample>,
}

/// Server-side liveness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub time: i64,
}

/// Reply to a client-originated `ping`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub time: i64,
    pub server_time: i64,
}

/// Frozen error codes for the `error` message and HTTP envelope.
pub mod error_codes {
    pub const CONNECT_ERROR: &str = "connect_error";
    pub const IO_ERROR: &str = "io_error";
    pub const DECODE_PARTIAL: &str = "decode_partial";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const SUBSCRIBER_OVERFLOW: &str = "subscriber_overflow";
    pub const BAD_ARGUMENT: &str = "bad_argument";
    pub const INVALID_FORMAT: &str = "invalid_format";
    pub const INTERNAL: &str = "internal";
}

/// Protocol error message (server -> subscriber).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
    pub data: ErrorPayload,
}

// ---------------------------------------------------------------------------
// Subscriber -> server messages
// ---------------------------------------------------------------------------

/// Request the current status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStatus {}

/// Request a channel's full history ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHistory {
    pub index: usize,
}

/// Client-side liveness response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPing {
    pub time: i64,
}

// ---------------------------------------------------------------------------
// Top-level discriminated union
// ---------------------------------------------------------------------------

/// All realtime message kinds, serialized/deserialized on the `type` field.
///
/// ```json
/// { "type": "welcome", "timestamp": 1234, "clientId": "..." }
/// ```
///
/// Every variant carries its own `timestamp` field ("Every message has
/// `type` and `timestamp`"); the envelope is flattened onto
/// each payload struct rather than wrapped, so each payload above also
/// derives a `timestamp: i64` field via `#[serde(flatten)]` at the call
/// site — see `Envelope<T>` below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum WsMessage {
    Welcome(Welcome),
    Metrics(Metrics),
    VelocityChanges(VelocityChanges),
    Status(StatusMessage),
    VelocityHistory(VelocityHistory),
    Ping(Ping),
    Pong(Pong),
    Error(ErrorMessage),
    GetStatus(GetStatus),
    GetHistory(GetHistory),
    ClientPing(ClientPing),
}

/// Wraps any `WsMessage` with the wire-mandated `timestamp` (ms since
/// epoch). Kept as a thin wrapper rather than folding `timestamp` into
/// every payload struct, mirroring the source protocol's flat `{type,
/// timestamp, ...payload}` shape while keeping each payload struct
/// reusable for HTTP responses that don't carry a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub message: WsMessage,
    pub timestamp: i64,
}

impl Envelope {
    #[must_use]
    pub fn new(message: WsMessage, timestamp: i64) -> Self {
        Self { message, timestamp }
    }
}

// ---------------------------------------------------------------------------
// HTTP API response types
// ---------------------------------------------------------------------------

/// Response for `GET /api/current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub status: String,
    pub timestamp: i64,
    pub positions: Vec<f64>,
    pub velocities: Vec<f64>,
}

/// Response for `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
}

/// Response for `GET /api/velocity-changes` and `GET /api/latest-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesResponse {
    pub changes: Vec<VelocityChangeEntry>,
}

/// Response for `GET /api/velocity-history/{n}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub index: usize,
    pub history: Vec<HistorySample>,
}

/// Response for `GET /api/discover`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub ws_url: String,
    pub api_url: String,
    pub version: String,
    pub ws_endpoint: String,
    pub api_endpoint: String,
}

/// Response for `GET /info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub address: String,
    pub uptime_secs: u64,
    pub connection_count: usize,
}

/// Response for `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub acquisition: String,
    pub store: String,
    pub subscribers: usize,
    pub advertiser: String,
}

/// Frozen HTTP error envelope used by all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
