//! Test harness shared by `radar-server`'s unit/integration suites: a mock
//! radar TCP endpoint and a realtime (WebSocket) subscriber client.

pub mod mock_radar;
pub mod realtime_client;

pub use mock_radar::{MockRadarServer, ScriptStep};
pub use realtime_client::{RealtimeClient, StalledSubscriber};
