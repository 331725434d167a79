//! Process entry point: loads configuration, wires the Acquisition Loop,
//! the Subscriber Hub, the Discovery Advertiser, and the HTTP/WS router,
//! and drives graceful shutdown.
//!
//! Grounded on `services/server/src/main.rs`'s `LOG_LEVEL`/tracing-init
//! and `shutdown_signal` ctrl_c/SIGTERM pattern.

use clap::{Arg, Command};
use radar_server::acquisition::AcquisitionLoop;
use radar_server::config::{load_config, Config, DEFAULT_CONFIG_PATH};
use radar_server::hub::{SubscriberHub, PING_INTERVAL};
use radar_server::metrics_sink::{LoggingSink, MetricsSink, NoopSink};
use radar_server::persistence::{self, PersistenceQueue};
use radar_server::radar_client::RadarClient;
use radar_server::{build_router, discovery, AppState};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(log_level)).init();

    let matches = Command::new("SICK Radar Acquisition Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Acquires and fans out SICK radar telemetry")
        .arg(
            Arg::new("config")
                .help("Path to the TOML configuration file")
                .short('c')
                .long("config")
                .default_value(DEFAULT_CONFIG_PATH),
        )
        .get_matches();
    let config_path = PathBuf::from(matches.get_one::<String>("config").expect("config has a default"));

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %config_path.display(), "failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(code) = run(config).await {
        std::process::exit(code);
    }
}

async fn run(config: Config) -> Result<(), i32> {
    let Config {
        name,
        listen_addr,
        radar: radar_cfg,
        sample_period,
        max_consecutive_errors,
        reconnect_delay,
        store: store_cfg,
        min_velocity_change,
        subscriber_queue_capacity,
        industrial_controller,
    } = config;

    let history_cap = store_cfg.history_cap;
    let change_log_cap = store_cfg.change_log_cap;
    let store = store_client::StoreClient::connect(store_cfg).await.map_err(|e| {
        error!(error = %e, "failed to initialize store adapter");
        1
    })?;
    let persistence_store = store.clone();

    let hub = Arc::new(SubscriberHub::new(subscriber_queue_capacity));
    let state = AppState::new(
        name.clone(),
        env!("CARGO_PKG_VERSION").to_owned(),
        listen_addr.clone(),
        hub.clone(),
        store,
        history_cap,
        change_log_cap,
    );

    let radar = RadarClient::new(
        radar_cfg.host.clone(),
        radar_cfg.port,
        radar_cfg.connect_timeout,
        radar_cfg.read_timeout,
    );

    let sink: Arc<dyn MetricsSink> = match &industrial_controller {
        Some(ic) => Arc::new(LoggingSink { address: ic.address.clone() }),
        None => Arc::new(NoopSink),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let persist_queue = PersistenceQueue::new(persistence::DEFAULT_QUEUE_CAPACITY);
    let persistence_shutdown = shutdown_tx.subscribe();
    let persistence_handle =
        tokio::spawn(persistence::run(persist_queue.clone(), persistence_store, persistence_shutdown));

    let acquisition = AcquisitionLoop::new(
        state.clone(),
        radar,
        min_velocity_change,
        sink,
        persist_queue,
        sample_period,
        max_consecutive_errors,
        reconnect_delay,
    );
    let acquisition_shutdown = shutdown_tx.subscribe();
    let acquisition_handle = tokio::spawn(acquisition.run(acquisition_shutdown));

    let ping_hub = hub.clone();
    let mut ping_shutdown = shutdown_tx.subscribe();
    let ping_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                _ = ping_shutdown.recv() => return,
                _ = interval.tick() => ping_hub.broadcast_ping().await,
            }
        }
    });

    let advertiser = {
        let (host, port) = split_listen_addr(&listen_addr);
        discovery::start(&name, &name, &host, port, env!("CARGO_PKG_VERSION"))
    };
    state.mark_advertiser(advertiser.is_some());

    let router = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.map_err(|e| {
        error!(error = %e, addr = %listen_addr, "failed to bind listen address");
        1
    })?;
    info!(addr = %listen_addr, "sickradar-server listening");

    let server_shutdown_tx = shutdown_tx.clone();
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = server_shutdown_tx.send(());
        })
        .await
        .map_err(|e| {
            error!(error = %e, "server error");
            1
        })?;

    hub.close_all().await;
    let _ = acquisition_handle.await;
    let _ = persistence_handle.await;
    ping_handle.abort();
    if let Some(advertiser) = advertiser {
        advertiser.stop();
    }
    info!("sickradar-server shut down gracefully");
    Ok(())
}

fn split_listen_addr(listen_addr: &str) -> (String, u16) {
    match listen_addr.rsplit_once(':') {
        Some((host, port)) => {
            let host = if host == "0.0.0.0" { "127.0.0.1" } else { host };
            (host.to_owned(), port.parse().unwrap_or(0))
        }
        None => (listen_addr.to_owned(), 0),
    }
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
