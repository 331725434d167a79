//! Shutdown: broadcasting on the shutdown channel stops the acquisition
//! loop and closing the hub drops every live subscriber connection.

mod common;

use common::{build_reply, Harness};
use radar_test_utils::RealtimeClient;

#[tokio::test]
async fn shutdown_closes_subscribers_and_stops_acquisition() {
    let harness = Harness::start().await;
    harness
        .mock_radar
        .set_default_reply(build_reply(1.0, 0.01, [1000; 7], [0; 7]));

    let mut client = RealtimeClient::connect(&harness.ws_url).await.expect("connect");
    client.recv().await.expect("welcome");
    assert_eq!(harness.state.hub.len().await, 1);

    harness.state.hub.close_all().await;
    assert_eq!(harness.state.hub.len().await, 0);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let recv_after_close = client.recv().await;
    assert!(recv_after_close.is_err(), "subscriber connection should end once the hub drops it");

    harness.join().await;
}
