//! Scenario D: sustained transport failure past `max_consecutive_errors`
//! surfaces as `comm_failure`, and `/health` reports `degraded`.

mod common;

use common::{Harness, HarnessConfig};
use radar_protocol::WsMessage;
use radar_test_utils::RealtimeClient;
use std::time::Duration;

#[tokio::test]
async fn sustained_failure_surfaces_as_comm_failure() {
    let cfg = HarnessConfig {
        tick_period: Duration::from_millis(10),
        max_consecutive_errors: 3,
        reconnect_delay: Duration::from_millis(5),
        ..HarnessConfig::default()
    };
    let harness = Harness::start_with(cfg).await;
    for _ in 0..20 {
        harness.mock_radar.push_disconnect();
    }

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    client.recv().await.expect("welcome");

    let status = client
        .recv_matching(|m| matches!(m, WsMessage::Status(s) if s.status == "comm_failure"))
        .await
        .expect("comm_failure broadcast");
    let WsMessage::Status(s) = status.message else { unreachable!() };
    assert!(s.error_count.unwrap_or(0) > 3);

    let resp = reqwest::get(format!("{}/health", harness.base_url)).await.expect("http request");
    let body: radar_protocol::HealthResponse = resp.json().await.expect("json body");
    assert_eq!(body.status, "degraded");
    assert_eq!(body.acquisition, "degraded");

    harness.join().await;
}
