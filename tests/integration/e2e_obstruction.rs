//! Scenario B: all seven positions zero flips status to `obstructed`,
//! broadcast over `/ws` and visible from `/api/status`.

mod common;

use common::{build_reply, Harness};
use radar_protocol::WsMessage;
use radar_test_utils::RealtimeClient;

#[tokio::test]
async fn all_zero_positions_surface_as_obstructed() {
    let harness = Harness::start().await;
    harness.mock_radar.set_default_reply(build_reply(1.0, 0.01, [0; 7], [0; 7]));

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    client.recv().await.expect("welcome");

    let status = client
        .recv_matching(|m| matches!(m, WsMessage::Status(s) if s.status == "obstructed"))
        .await
        .expect("status broadcast");
    let WsMessage::Status(s) = status.message else { unreachable!() };
    assert_eq!(s.status, "obstructed");

    let resp = reqwest::get(format!("{}/api/status", harness.base_url))
        .await
        .expect("http request");
    let body: radar_protocol::StatusResponse = resp.json().await.expect("json body");
    assert_eq!(body.status, "obstructed");

    harness.join().await;
}
