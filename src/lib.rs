//! Host-side logger for the ChiroLogger wireless environmental data logger.
//!
//! Raw lines arrive over Bluetooth LE ([`bluetooth::link`]), are decoded into
//! readings ([`bluetooth::decoder`]) and appended to the [`logger::SessionLog`],
//! which groups them into sessions, persists completed sessions through a
//! [`storage::SessionStorage`] and exports them as CSV.

pub mod bluetooth;
pub mod chart;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod export;
pub mod logger;
pub mod models;
pub mod storage;
pub mod utils;

pub use bluetooth::{decode_line, DecodeError, LinkEvent};
pub use export::ExportTarget;
pub use logger::{LogError, LogEvent, SessionLog};
pub use models::{DeviceInfo, Metric, Reading, Session, SessionStats};
pub use storage::{JsonFileStorage, MemoryStorage, SessionStorage, StorageError};
