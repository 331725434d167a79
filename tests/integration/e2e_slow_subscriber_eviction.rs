//! Scenario F: a subscriber that never reads is evicted once its bounded
//! queue fills, without affecting a second, actively-draining subscriber.

mod common;

use common::{build_reply, Harness, HarnessConfig};
use radar_test_utils::{RealtimeClient, StalledSubscriber};
use std::time::Duration;

#[tokio::test]
async fn stalled_subscriber_is_evicted_while_fast_subscriber_keeps_receiving() {
    let cfg = HarnessConfig {
        tick_period: Duration::from_millis(5),
        subscriber_queue_capacity: 2,
        ..HarnessConfig::default()
    };
    let harness = Harness::start_with(cfg).await;
    harness
        .mock_radar
        .set_default_reply(build_reply(1.0, 0.01, [1000; 7], [100, 0, 0, 0, 0, 0, 0]));

    let _stalled = StalledSubscriber::connect(&harness.ws_url).await.expect("stalled connect");
    let mut fast = RealtimeClient::connect(&harness.ws_url).await.expect("fast connect");
    fast.recv().await.expect("welcome");

    // Keep draining the fast subscriber throughout, so its own 2-slot queue
    // never fills; the stalled subscriber never reads and so fills up from
    // the steady stream of coalesced-but-still-periodic metrics broadcasts.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(400);
    let mut fast_message_count = 0;
    while tokio::time::Instant::now() < deadline {
        if tokio::time::timeout(Duration::from_millis(20), fast.recv()).await.is_ok() {
            fast_message_count += 1;
        }
    }

    assert_eq!(harness.state.hub.len().await, 1, "only the fast subscriber should remain");
    assert!(fast_message_count > 0, "fast subscriber should have kept receiving");

    harness.join().await;
}
