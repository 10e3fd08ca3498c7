use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use keybridge::config::AppConfig;
use keybridge::mqtt::{MqttConfig, RumqttTransport, TransportEvent, TransportSettings};
use keybridge::panel::{ControlPanel, InputBatch};
use keybridge::ui::{KeybridgeUi, WINDOW_TITLE};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Time the transport gets to send queued releases and the DISCONNECT
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "keybridge", version, about = "Keyboard to MQTT button panel")]
struct Cli {
    /// Configuration file, defaults to <config dir>/keybridge/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load(&config_path)?;
    let mqtt_config = MqttConfig::from_app_config(&config)?;

    let (input_tx, input_rx) = mpsc::unbounded_channel::<InputBatch>();
    let (transport_tx, transport_rx) =
        mpsc::channel::<TransportEvent>(config.main.channel_capacity);

    let transport = RumqttTransport::new(
        TransportSettings::from(&config),
        transport_tx,
        CancellationToken::new(),
    );
    let panel = ControlPanel::from_config(&config, Box::new(transport))?;
    let view_rx = panel.subscribe_view();
    let panel = panel.connect(&mqtt_config)?;

    let shutdown = CancellationToken::new();
    let panel_task = tokio::spawn(panel.run(input_rx, transport_rx, shutdown.clone()));

    info!("Starting UI");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title(WINDOW_TITLE)
        .with_inner_size([560.0, 320.0]);

    let ui_result = eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(|_cc| Ok(Box::new(KeybridgeUi::new(input_tx, view_rx)))),
    );
    if let Err(e) = &ui_result {
        error!("UI stopped with error: {}", e);
    }

    info!("Window closed, stopping control panel");
    shutdown.cancel();
    let stopped = panel_task
        .await
        .map_err(|e| eyre!("Control panel task failed: {}", e))?;

    // keep the transport alive until the disconnect went out
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    debug!("Final view: {:?}", stopped.into_view());

    ui_result.map_err(|e| eyre!("UI failed: {}", e))
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", if verbose { "debug" } else { "info" })
    }
    setup_logging_env(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
