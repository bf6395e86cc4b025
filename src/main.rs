//! Fleet launcher: loads the TOML configuration, boots one task per
//! simulated station and runs until SIGINT.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use ocpp_station_sim::config::{default_config_path, AppConfig};
use ocpp_station_sim::domain::StationTemplate;
use ocpp_station_sim::notifications::{EventBus, StationEvent};
use ocpp_station_sim::station::{run_station, StationRuntime};
use ocpp_station_sim::support::clock::system_clock;
use ocpp_station_sim::support::shutdown::ShutdownCoordinator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = default_config_path();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => {
            init_tracing(&config.logging.level);
            info!("Configuration loaded from {}", config_path.display());
            config
        }
        Err(e) => {
            let config = AppConfig::default();
            init_tracing(&config.logging.level);
            warn!("Failed to load config: {e}. Using defaults.");
            config
        }
    };

    if config.stations.is_empty() {
        error!("No station entries configured; nothing to simulate");
        return Ok(());
    }

    info!("Starting OCPP 1.6 station simulator...");

    let events = EventBus::new();
    let clock = system_clock();
    let shutdown = ShutdownCoordinator::new();

    // Forward lifecycle events to the supervisor log.
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            match event {
                StationEvent::Started { station_id, hash_id } => {
                    info!(station_id = station_id.as_str(), hash_id = hash_id.as_str(), "station started")
                }
                StationEvent::Stopped { station_id } => {
                    info!(station_id = station_id.as_str(), "station stopped")
                }
                StationEvent::Updated { station_id, connector_id, status } => {
                    info!(
                        station_id = station_id.as_str(),
                        connector_id,
                        status = status.as_str(),
                        "connector updated"
                    )
                }
            }
        }
    });

    let runtime = StationRuntime {
        supervision_url: config.supervision.url.clone(),
        request_timeout: std::time::Duration::from_secs(config.supervision.request_timeout_secs),
        data_dir: config.data_dir.clone(),
    };

    let mut tasks = Vec::new();
    for entry in &config.stations {
        let template = match StationTemplate::load(&entry.template) {
            Ok(template) => Arc::new(template),
            Err(e) => {
                error!(template = %entry.template.display(), error = %e, "Skipping template");
                continue;
            }
        };
        for index in 1..=entry.count {
            let info = template.station_info(index);
            info!(
                station_id = info.id.as_str(),
                template = %entry.template.display(),
                "Launching station"
            );
            tasks.push(tokio::spawn(run_station(
                info,
                template.clone(),
                runtime.clone(),
                events.clone(),
                clock.clone(),
                StdRng::from_entropy(),
                shutdown.signal(),
            )));
        }
    }

    if tasks.is_empty() {
        error!("No stations could be launched");
        return Ok(());
    }
    info!("{} station(s) running. Press Ctrl+C to stop.", tasks.len());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.shutdown();

    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Station task failed: {e}"),
            Err(e) => error!("Station task panicked: {e}"),
        }
    }

    info!("Simulator shutdown complete");
    Ok(())
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}
