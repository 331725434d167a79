//! Scenario C: a couple of transport disconnects below the
//! `max_consecutive_errors` threshold recover to `ok` without ever
//! reaching `comm_failure`.

mod common;

use common::{build_reply, Harness};
use radar_protocol::WsMessage;
use radar_test_utils::RealtimeClient;

#[tokio::test]
async fn transient_disconnects_recover_without_comm_failure() {
    let harness = Harness::start().await;
    harness.mock_radar.push_disconnect();
    harness.mock_radar.push_disconnect();
    harness
        .mock_radar
        .set_default_reply(build_reply(1.0, 0.01, [1000; 7], [0; 7]));

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    client.recv().await.expect("welcome");

    // Drain broadcasts for a while; comm_failure must never appear, and the
    // status must settle back to ok.
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(500);
    let mut saw_ok_after_recovery = false;
    while tokio::time::Instant::now() < deadline {
        let Ok(Ok(envelope)) =
            tokio::time::timeout(std::time::Duration::from_millis(50), client.recv()).await
        else {
            continue;
        };
        if let WsMessage::Status(s) = envelope.message {
            assert_ne!(s.status, "comm_failure", "threshold was never supposed to be exceeded");
            if s.status == "ok" {
                saw_ok_after_recovery = true;
                break;
            }
        }
    }
    assert!(saw_ok_after_recovery, "status should have recovered to ok");

    let resp = reqwest::get(format!("{}/api/status", harness.base_url)).await.expect("http request");
    let body: radar_protocol::StatusResponse = resp.json().await.expect("json body");
    assert_eq!(body.status, "ok");
    assert_eq!(body.consecutive_errors, 0);

    harness.join().await;
}
