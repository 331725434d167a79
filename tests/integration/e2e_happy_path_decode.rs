//! Scenario A: a clean radar reply decodes, fans out over `/ws`, and is
//! readable back from `/api/current`.

mod common;

use common::{build_reply, Harness};
use radar_protocol::WsMessage;
use radar_test_utils::RealtimeClient;

#[tokio::test]
async fn happy_path_reaches_subscriber_and_http_surface() {
    let harness = Harness::start().await;
    harness.mock_radar.set_default_reply(build_reply(
        1.0,
        0.01,
        [1000, 2000, 3000, 4000, 5000, 6000, 7000],
        [10, -10, 0, 20, 0, 0, 0],
    ));

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    let welcome = client.recv().await.expect("welcome");
    assert!(matches!(welcome.message, WsMessage::Welcome(_)));

    let metrics = client
        .recv_matching(|m| matches!(m, WsMessage::Metrics(_)))
        .await
        .expect("metrics frame");
    let WsMessage::Metrics(m) = metrics.message else { unreachable!() };
    assert_eq!(m.status, "ok");
    assert_eq!(m.positions[0], 1.0);
    assert_eq!(m.velocities[0], 0.10);

    let resp = reqwest::get(format!("{}/api/current", harness.base_url))
        .await
        .expect("http request");
    assert_eq!(resp.status(), 200);
    let body: radar_protocol::SnapshotResponse = resp.json().await.expect("json body");
    assert_eq!(body.status, "ok");
    assert_eq!(body.positions[0], 1.0);

    harness.join().await;
}
