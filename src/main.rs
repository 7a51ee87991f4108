mod api;
mod config;
mod error;
mod hardware;
mod janitor;
mod live_state;
mod models;
mod sampling;
mod shutdown;
mod storage;
mod utils;

use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Mutex;

use api::AppState;
use config::MonitorConfig;
use hardware::{open_actuator, open_sensor};
use janitor::RetentionJanitor;
use live_state::LiveState;
use sampling::{SamplingLoop, SamplingSettings};
use shutdown::Shutdown;
use storage::{AveragingBuffer, RetentionStore};
use utils::format_datetime;

/// Grace period for blocking work (a stuck sensor read) once the monitor has stopped
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run());
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if result.is_ok() {
        info!("Program terminated. Exiting gracefully.");
    }
    result
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match MonitorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting environmental monitor at {}",
        format_datetime(&OffsetDateTime::now_utc().to_offset(config.utc_offset))
    );

    // Shared state: history is loaded before any worker starts
    let live = Arc::new(LiveState::new());
    let buffer = Arc::new(Mutex::new(AveragingBuffer::new(config.averaging_window)));
    let (history_file, max_points, utc_offset) = (
        config.history_file.clone(),
        config.max_history_points,
        config.utc_offset,
    );
    let store = tokio::task::spawn_blocking(move || {
        RetentionStore::load(history_file, max_points, utc_offset)
    })
    .await?;
    info!(
        "History holds {} points ({})",
        store.len(),
        store.path().display()
    );
    let store = Arc::new(Mutex::new(store));

    let sensor = open_sensor(&config);
    let actuator = match open_actuator(&config) {
        Ok(actuator) => actuator,
        Err(e) => {
            error!("Failed to initialise buzzer: {}", e);
            return Err(e.into());
        }
    };

    let shutdown = Shutdown::new();

    let sampler = SamplingLoop::new(
        sensor,
        actuator,
        Arc::clone(&live),
        Arc::clone(&buffer),
        Arc::clone(&store),
        SamplingSettings::from(&config),
    );
    let sampler_handle = tokio::spawn(sampler.run(shutdown.subscribe()));

    let janitor = RetentionJanitor::new(Arc::clone(&store), &config);
    let janitor_handle = tokio::spawn(janitor.run(shutdown.subscribe()));

    let state = web::Data::new(AppState {
        live,
        buffer,
        store,
        utc_offset: config.utc_offset,
    });

    info!(
        "Starting HTTP server on http://{}:{}",
        config.http_host, config.http_port
    );
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .disable_signals()
    .bind((config.http_host.as_str(), config.http_port))?
    .run();
    let server_handle = server.handle();
    tokio::pin!(server);

    // Every stop path funnels into the same shutdown trigger
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut server_running = true;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            shutdown.trigger("CTRL+C detected");
        }
        _ = sigterm.recv() => {
            shutdown.trigger("SIGTERM received");
        }
        result = &mut server => {
            server_running = false;
            if let Err(e) = result {
                error!("HTTP server failed: {}", e);
            }
            shutdown.trigger("HTTP server stopped");
        }
    }

    if server_running {
        let (_, result) = tokio::join!(server_handle.stop(true), &mut server);
        if let Err(e) = result {
            error!("HTTP server failed during shutdown: {}", e);
        }
    }

    if let Err(e) = sampler_handle.await {
        error!("Sampling loop task failed: {}", e);
    }
    if let Err(e) = janitor_handle.await {
        error!("Retention janitor task failed: {}", e);
    }

    Ok(())
}
