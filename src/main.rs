//! OCPP 1.6J charging-station simulator.
//! Reads configuration from TOML file (~/.config/ocpp-station-sim/config.toml).

use std::sync::Arc;

use tracing::{error, info};

use ocpp_station_sim::application::atg::AutomaticTransactionGenerator;
use ocpp_station_sim::domain::{ChargingStation, ConnectionFactory, StationInfo};
use ocpp_station_sim::shared::shutdown::ShutdownCoordinator;
use ocpp_station_sim::{
    create_worker_channel, default_config_path, CommandDispatcher, SimulatorConfig,
    WebSocketConnectionFactory,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("OCPP_SIM_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let cfg = match SimulatorConfig::load(&config_path) {
        Ok(cfg) => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level)),
                )
                .init();
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config: {}. Using defaults.", e);
            SimulatorConfig::default()
        }
    };

    info!("Starting OCPP station simulator...");

    let connection_factory: Arc<WebSocketConnectionFactory> = Arc::new(WebSocketConnectionFactory);
    let worker_channel = create_worker_channel();

    // ── Build and start one station + ATG + dispatcher per template ──
    let mut dispatchers = Vec::new();
    for template in &cfg.stations {
        let station_info = StationInfo {
            charge_point_vendor: template.charge_point_vendor.clone(),
            charge_point_model: template.charge_point_model.clone(),
            charge_point_serial_number: template.charge_point_serial_number.clone(),
            firmware_version: template.firmware_version.clone(),
            meter_value_sample_interval_ms: ocpp_station_sim::domain::station_info::DEFAULT_METER_VALUES_INTERVAL_MS,
            automatic_transaction_generator: template.automatic_transaction_generator.clone(),
        };

        let station = Arc::new(ChargingStation::from_template(
            template.hash_id.clone(),
            station_info,
            template.connector_count,
            template.authorized_tags.clone(),
            template.supervision_url.clone(),
        ));

        match connection_factory
            .connect(station.hash_id(), &template.supervision_url)
            .await
        {
            Ok(service) => {
                station.open_ws_connection(service).await;
                info!(hash_id = template.hash_id, "WebSocket connection opened");
            }
            Err(e) => {
                error!(
                    hash_id = template.hash_id,
                    "failed to open initial WebSocket connection: {}", e
                );
            }
        }

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        let dispatcher = CommandDispatcher::new(
            Arc::clone(&station),
            atg,
            Arc::clone(&connection_factory) as Arc<dyn ConnectionFactory>,
            Arc::clone(&worker_channel),
        );
        dispatcher.spawn_listener();
        dispatchers.push(dispatcher);
    }

    info!(stations = dispatchers.len(), "All stations started.");

    // ── Run until SIGINT/SIGTERM ────────────────────────────────
    let shutdown = ShutdownCoordinator::default();
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();
    shutdown_signal.wait().await;

    info!("OCPP station simulator shutdown complete");
    Ok(())
}
