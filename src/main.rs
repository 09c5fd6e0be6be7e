use clap::Parser;
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};

use chiro_logger::bluetooth::{run_link, DeviceCommand};
use chiro_logger::cli::{self, Cli, Command};
use chiro_logger::config::LoggerConfig;
use chiro_logger::dispatch::Dispatcher;
use chiro_logger::logger::{LogEvent, SessionLog};
use chiro_logger::storage::JsonFileStorage;
use chiro_logger::utils::{format_datetime, format_duration};

const LINK_CHANNEL_CAPACITY: usize = 256;

async fn record(config: LoggerConfig, log: SessionLog, send: Vec<DeviceCommand>) {
    info!("Starting ChiroLogger data collection");

    let mut events = log.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Skipped {} log events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                LogEvent::SessionStarted(session) => info!(
                    "Session started at {}",
                    format_datetime(&session.start_time())
                ),
                LogEvent::ReadingAppended { reading, data_count } => info!(
                    "#{} {}: temp={:.2}°C, humidity={:.1}%, pressure={:.1} hPa, battery={:.2} V",
                    data_count,
                    format_datetime(&reading.timestamp),
                    reading.temperature,
                    reading.humidity,
                    reading.pressure,
                    reading.battery_voltage
                ),
                LogEvent::SessionEnded(session) => {
                    let duration = session
                        .end_time()
                        .map(|end| end - session.start_time())
                        .unwrap_or(time::Duration::ZERO);
                    info!(
                        "Session ended: {} readings over {}",
                        session.data_count(),
                        format_duration(duration)
                    );
                }
                _ => {}
            }
        }
    });

    let (link_tx, link_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let dispatcher = tokio::spawn(Dispatcher::new(log).run(link_rx, shutdown_rx));

    let link_config = config.link.clone();
    let mut link = tokio::spawn(async move { run_link(&link_config, &send, link_tx).await });

    // Handle Ctrl+C gracefully
    tokio::select! {
        result = &mut link => {
            match result {
                Ok(Ok(())) => info!("Data logger link closed"),
                Ok(Err(e)) => error!("Link failed: {}", e),
                Err(e) => error!("Link task failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Program terminated by user. Exiting gracefully.");
            link.abort();
        }
    }

    let _ = shutdown_tx.send(());
    match dispatcher.await {
        Ok(log) => info!("{} sessions stored", log.sessions().len()),
        Err(e) => error!("Dispatcher failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let args = Cli::parse();

    // Load configuration
    let config = match LoggerConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let storage = JsonFileStorage::new(&config.data_file);
    let mut log = SessionLog::open(Box::new(storage));

    match args.command.unwrap_or(Command::Run { send: Vec::new() }) {
        Command::Run { send } => record(config, log, send).await,
        Command::Sessions => println!("{}", cli::list_sessions(&log)),
        Command::Readings { limit } => println!("{}", cli::list_readings(&log, limit)),
        Command::Chart { metric, window } => println!("{}", cli::chart(&log, metric, window)),
        Command::Export { session, output } => {
            let path = cli::export(&log, session, output, &config.export_dir)?;
            println!("Exported to {}", path.display());
        }
        Command::Delete { index } => {
            let removed = log.delete_session(index)?;
            println!(
                "Deleted session of {} ({} readings)",
                removed.device_info().display_name(),
                removed.data_count()
            );
        }
        Command::Clear => {
            if log.sessions().is_empty() {
                warn!("Nothing to clear");
            }
            log.clear_all();
            println!("All sessions deleted");
        }
    }

    Ok(())
}
