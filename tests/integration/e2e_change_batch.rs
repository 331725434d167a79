//! Scenario E: a velocity jump past `min_velocity_change` is broadcast as
//! a `velocity_changes` batch carrying exactly the channels that moved.

mod common;

use common::{build_reply, Harness};
use radar_protocol::WsMessage;
use radar_test_utils::RealtimeClient;

#[tokio::test]
async fn velocity_jump_is_broadcast_as_a_change_batch() {
    let harness = Harness::start().await;
    // First tick: zero velocities (channel 2 non-trivial position only).
    harness
        .mock_radar
        .push_reply(build_reply(1.0, 0.01, [1000; 7], [0; 7]));
    // Second tick: channel 3 (0-based index 2) jumps well past threshold.
    harness
        .mock_radar
        .set_default_reply(build_reply(1.0, 0.01, [1000; 7], [0, 0, 500, 0, 0, 0, 0]));

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    client.recv().await.expect("welcome");

    let batch = client
        .recv_matching(|m| matches!(m, WsMessage::VelocityChanges(_)))
        .await
        .expect("change batch");
    let WsMessage::VelocityChanges(batch) = batch.message else { unreachable!() };
    assert_eq!(batch.changes.len(), 1);
    assert_eq!(batch.changes[0].index, 2);
    assert_eq!(batch.changes[0].new_value, 5.0);

    harness.join().await;
}
