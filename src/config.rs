use bluer::Uuid;
use std::env;
use std::path::PathBuf;

// GATT layout of the data logger firmware
pub const DEFAULT_SERVICE_UUID: &str = "12345678-1234-1234-1234-123456789abc";
pub const DEFAULT_CHARACTERISTIC_UUID: &str = "87654321-4321-4321-4321-cba987654321";
pub const DEFAULT_NAME_PREFIX: &str = "ChiroLogger";
pub const DEFAULT_DATA_FILE: &str = "chiro-logger-sessions.json";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 20;

/// Where and how to find the data logger over Bluetooth.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub name_prefix: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub scan_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggerConfig {
    pub data_file: PathBuf,
    pub export_dir: PathBuf,
    pub link: LinkConfig,
}

impl LoggerConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let parse_uuid = |key: &str, default: &str| -> Result<Uuid, String> {
            let text = value(key, default);
            Uuid::parse_str(&text)
                .map_err(|e| format!("{} is not a valid UUID ({}): {}", key, text, e))
        };

        let scan_timeout_secs = value(
            "CHIRO_SCAN_TIMEOUT_SECS",
            &DEFAULT_SCAN_TIMEOUT_SECS.to_string(),
        );
        let scan_timeout_secs: u64 = scan_timeout_secs.parse().map_err(|_| {
            format!(
                "CHIRO_SCAN_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                scan_timeout_secs
            )
        })?;
        if scan_timeout_secs == 0 {
            return Err("CHIRO_SCAN_TIMEOUT_SECS must be greater than zero".into());
        }

        let link = LinkConfig {
            name_prefix: value("CHIRO_NAME_PREFIX", DEFAULT_NAME_PREFIX),
            service_uuid: parse_uuid("CHIRO_SERVICE_UUID", DEFAULT_SERVICE_UUID)?,
            characteristic_uuid: parse_uuid(
                "CHIRO_CHARACTERISTIC_UUID",
                DEFAULT_CHARACTERISTIC_UUID,
            )?,
            scan_timeout_secs,
        };

        Ok(LoggerConfig {
            data_file: PathBuf::from(value("CHIRO_DATA_FILE", DEFAULT_DATA_FILE)),
            export_dir: PathBuf::from(value("CHIRO_EXPORT_DIR", ".")),
            link,
        })
    }
}
