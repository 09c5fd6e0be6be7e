/// Bluetooth Low Energy link to the data logger
///
/// The link only discovers, connects and forwards raw text. Decoding and
/// storage happen on the other end of the event channel.
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use bluer::gatt::remote::Characteristic;
use bluer::{AdapterEvent, Device, DiscoveryFilter, DiscoveryTransport};

use super::decoder::split_payload;
use crate::config::LinkConfig;
use crate::models::DeviceInfo;

const MAX_CONNECT_ATTEMPTS: usize = 3;
const WAIT_BETWEEN_RETRIES: u64 = 2;

/// Notifications from the link, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    SessionStart(DeviceInfo),
    RawLine(String),
    SessionEnd,
}

/// Commands understood by the data logger firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DeviceCommand {
    DownloadAll,
    BatteryStatus,
    ClearData,
}

impl DeviceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::DownloadAll => "DOWNLOAD_ALL",
            DeviceCommand::BatteryStatus => "BATTERY_STATUS",
            DeviceCommand::ClearData => "CLEAR_DATA",
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
    #[error("no data logger found within {0} seconds")]
    NotFound(u64),
    #[error("data logger does not expose characteristic {0}")]
    CharacteristicMissing(bluer::Uuid),
    #[error("event channel closed")]
    ChannelClosed,
}

/// Connect to the data logger and forward its lines until it disconnects
///
/// Sends `SessionStart` once notifications are flowing, one `RawLine` per
/// received line, and `SessionEnd` when the notification stream ends.
/// Aborting the task cancels a pending connection without touching the log.
pub async fn run_link(
    config: &LinkConfig,
    commands: &[DeviceCommand],
    events: mpsc::Sender<LinkEvent>,
) -> Result<(), LinkError> {
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let filter = DiscoveryFilter {
        transport: DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!(
        "Scanning for devices named {}* or advertising {}",
        config.name_prefix, config.service_uuid
    );
    let device = {
        let mut discovery = Box::pin(adapter.discover_devices().await?);
        let search = async {
            while let Some(event) = discovery.next().await {
                if let AdapterEvent::DeviceAdded(addr) = event {
                    let device = match adapter.device(addr) {
                        Ok(device) => device,
                        Err(_) => continue,
                    };
                    if is_data_logger(&device, config).await {
                        return Some(device);
                    }
                }
            }
            None
        };
        match timeout(Duration::from_secs(config.scan_timeout_secs), search).await {
            Ok(Some(device)) => device,
            _ => return Err(LinkError::NotFound(config.scan_timeout_secs)),
        }
    };

    connect_with_retry(&device).await?;
    let characteristic = find_characteristic(&device, config).await?;

    for command in commands {
        info!("Sending command {}", command.as_str());
        characteristic.write(command.as_str().as_bytes()).await?;
    }

    let mut notifications = Box::pin(characteristic.notify().await?);

    let address = device.address().to_string().to_uppercase();
    let name = device.name().await.ok().flatten();
    let info = DeviceInfo {
        id: address.clone(),
        name: Some(name.unwrap_or_else(|| config.name_prefix.clone())),
        mac_address: address,
        is_connected: true,
        last_sync: Some(OffsetDateTime::now_utc()),
        battery_level: None,
    };
    info!("Connected to data logger {}", info.display_name());
    send(&events, LinkEvent::SessionStart(info)).await?;

    while let Some(payload) = notifications.next().await {
        for line in split_payload(&payload) {
            debug!("Received line: {}", line);
            send(&events, LinkEvent::RawLine(line)).await?;
        }
    }

    info!("Notification stream ended, data logger disconnected");
    send(&events, LinkEvent::SessionEnd).await?;

    if let Err(e) = device.disconnect().await {
        debug!("Disconnect after stream end failed: {}", e);
    }
    Ok(())
}

async fn is_data_logger(device: &Device, config: &LinkConfig) -> bool {
    if let Ok(Some(name)) = device.name().await {
        if name.starts_with(&config.name_prefix) {
            return true;
        }
    }
    matches!(device.uuids().await, Ok(Some(uuids)) if uuids.contains(&config.service_uuid))
}

async fn connect_with_retry(device: &Device) -> Result<(), LinkError> {
    let mut attempt = 1;
    loop {
        match device.connect().await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                error!("Attempt {}: connection error: {}", attempt, e);
                attempt += 1;
                sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn find_characteristic(
    device: &Device,
    config: &LinkConfig,
) -> Result<Characteristic, LinkError> {
    for service in device.services().await? {
        if service.uuid().await? != config.service_uuid {
            continue;
        }
        for characteristic in service.characteristics().await? {
            if characteristic.uuid().await? == config.characteristic_uuid {
                return Ok(characteristic);
            }
        }
    }
    Err(LinkError::CharacteristicMissing(config.characteristic_uuid))
}

async fn send(events: &mpsc::Sender<LinkEvent>, event: LinkEvent) -> Result<(), LinkError> {
    events.send(event).await.map_err(|_| LinkError::ChannelClosed)
}
