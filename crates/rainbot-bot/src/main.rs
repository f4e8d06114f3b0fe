use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rainbot_alerts::{AlertPolicy, AlertService, Dispatcher};
use rainbot_core::config::{LoggingConfig, RainbotConfig};
use rainbot_scheduler::Scheduler;
use rainbot_telegram::TelegramAdapter;
use rainbot_weather::{ForecastClient, OpenMeteoClient, ZoneResolver};

/// Daily rain alerts over Telegram.
#[derive(Parser)]
#[command(name = "rainbot", version)]
struct Args {
    /// Config file. Falls back to RAINBOT_CONFIG, then ~/.rainbot/rainbot.toml.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // load config: explicit path > RAINBOT_CONFIG env > ~/.rainbot/rainbot.toml
    let config_path = args.config.or_else(|| std::env::var("RAINBOT_CONFIG").ok());
    let config = RainbotConfig::load(config_path.as_deref()).context("loading config")?;

    init_tracing(&config.logging)?;

    anyhow::ensure!(config.scheduler.tick_ms > 0, "scheduler.tick_ms must be positive");
    anyhow::ensure!(
        config.scheduler.channel_capacity > 0,
        "scheduler.channel_capacity must be positive"
    );

    let store = rainbot_store::open_store(&config.database)?;
    info!(backend = ?config.database.backend, "store opened");

    // Fired-trigger channel: Scheduler loop → Dispatcher task
    let (fired_tx, fired_rx) = tokio::sync::mpsc::channel(config.scheduler.channel_capacity);
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        fired_tx,
        Duration::from_millis(config.scheduler.tick_ms),
    ));

    let forecast: Arc<dyn ForecastClient> = Arc::new(OpenMeteoClient::new(&config.forecast)?);
    info!("loading time zone boundaries");
    let resolver = Arc::new(ZoneResolver::tzf());

    let service = Arc::new(AlertService::new(
        store,
        Arc::clone(&scheduler),
        resolver,
        Arc::clone(&forecast),
    ));
    let adapter = TelegramAdapter::new(&config.telegram, service)?;

    let dispatcher = Arc::new(Dispatcher::new(
        forecast,
        AlertPolicy::new(&config.alerts),
        Arc::new(adapter.transport()),
        Arc::clone(&scheduler),
    ));
    tokio::spawn(dispatcher.run(fired_rx));

    let restored = scheduler.start()?;
    info!(restored, "scheduler started");

    // returns on ctrl-c
    adapter.run().await?;

    scheduler.stop().await;
    info!("rainbot stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter. With `logging.file` set, logs
/// are appended there without ANSI colours.
fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {path}"))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}
