//! Shared end-to-end harness: wires a real `radar_server::AppState` plus
//! acquisition loop against a `MockRadarServer`, serves the router on an
//! OS-assigned port, and hands back URLs plus handles for the test to
//! drive and tear down.
//!
//! The store adapter runs disabled in every scenario here (no live Redis
//! in this environment); this exercises the in-memory `last_frame`
//! fallback path documented in §7 rather than the store-backed reads.

use radar_server::acquisition::AcquisitionLoop;
use radar_server::hub::SubscriberHub;
use radar_server::metrics_sink::NoopSink;
use radar_server::persistence::{self, PersistenceQueue};
use radar_server::radar_client::RadarClient;
use radar_server::{build_router, AppState};
use radar_test_utils::MockRadarServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store_client::{StoreClient, StoreConfig};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Harness {
    pub base_url: String,
    pub ws_url: String,
    pub mock_radar: MockRadarServer,
    pub state: AppState,
    shutdown_tx: broadcast::Sender<()>,
    server_task: JoinHandle<()>,
    acquisition_task: JoinHandle<()>,
    persistence_task: JoinHandle<()>,
}

pub struct HarnessConfig {
    pub tick_period: Duration,
    pub max_consecutive_errors: u32,
    pub reconnect_delay: Duration,
    pub min_velocity_change: f64,
    pub subscriber_queue_capacity: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(20),
            max_consecutive_errors: 3,
            reconnect_delay: Duration::from_millis(10),
            min_velocity_change: 0.01,
            subscriber_queue_capacity: 8,
        }
    }
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(HarnessConfig::default()).await
    }

    pub async fn start_with(cfg: HarnessConfig) -> Self {
        let mock_radar = MockRadarServer::start().await;
        let radar_port = mock_radar.local_addr().port();

        let store = StoreClient::connect(StoreConfig { enabled: false, ..StoreConfig::default() })
            .await
            .expect("disabled store never fails to connect");

        let hub = Arc::new(SubscriberHub::new(cfg.subscriber_queue_capacity));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local_addr");

        let state = AppState::new(
            "test-sickradar".to_owned(),
            "0.0.0-test".to_owned(),
            addr.to_string(),
            hub,
            store,
            1000,
            100,
        );

        let radar = RadarClient::new(
            "127.0.0.1".to_owned(),
            radar_port,
            Duration::from_secs(2),
            Duration::from_secs(2),
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let persist_queue = PersistenceQueue::new(persistence::DEFAULT_QUEUE_CAPACITY);
        let persistence_task = tokio::spawn(persistence::run(
            persist_queue.clone(),
            state.store.clone(),
            shutdown_tx.subscribe(),
        ));

        let acquisition = AcquisitionLoop::new(
            state.clone(),
            radar,
            cfg.min_velocity_change,
            Arc::new(NoopSink),
            persist_queue,
            cfg.tick_period,
            cfg.max_consecutive_errors,
            cfg.reconnect_delay,
        );

        let acquisition_task = tokio::spawn(acquisition.run(shutdown_tx.subscribe()));

        let router = build_router(state.clone());
        let server_task = tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .expect("test server error");
        });

        // Give the acquisition loop a moment to complete its first tick.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            mock_radar,
            state,
            shutdown_tx,
            server_task,
            acquisition_task,
            persistence_task,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub async fn join(self) {
        self.shutdown();
        let _ = self.acquisition_task.await;
        let _ = self.persistence_task.await;
        self.server_task.abort();
    }
}

/// Formats an `f32`'s IEEE-754 bit pattern as the 8-hex-digit scale field
/// the decoder expects, per §4.1.
pub fn hex_f32(value: f32) -> String {
    format!("{:08X}", value.to_bits())
}

/// Builds a `sRA LMDradardata` reply with the given per-channel position
/// and velocity scale plus raw sample words, matching §4.1's wire shape.
pub fn build_reply(position_scale: f32, velocity_scale: f32, positions: [u32; 7], velocities: [i32; 7]) -> Vec<u8> {
    let pos_words: Vec<String> = positions.iter().map(|p| format!("{p:04X}")).collect();
    let vel_words: Vec<String> = velocities
        .iter()
        .map(|v| format!("{:04X}", (*v as i16) as u16))
        .collect();
    format!(
        "sRA LMDradardata P3DX1 {} 0 7 {} V3DX1 {} 0 7 {}",
        hex_f32(position_scale),
        pos_words.join(" "),
        hex_f32(velocity_scale),
        vel_words.join(" ")
    )
    .into_bytes()
}
