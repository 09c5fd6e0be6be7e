/// Durable storage for completed sessions
pub mod json_file;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Session;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

/// Key under which the session array is kept in the stored document
pub const STORAGE_KEY: &str = "chiro-logger-sessions";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored sessions are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Where completed sessions are saved between runs
///
/// Only completed sessions pass through here; the active session lives in
/// memory until it is ended.
pub trait SessionStorage: Send {
    fn save(&self, sessions: &[Session]) -> Result<(), StorageError>;
    fn load(&self) -> Result<Vec<Session>, StorageError>;
}

#[derive(Serialize)]
struct StoredDocumentRef<'a> {
    #[serde(rename = "chiro-logger-sessions")]
    sessions: &'a [Session],
}

#[derive(Deserialize)]
struct StoredDocument {
    #[serde(rename = "chiro-logger-sessions", default)]
    sessions: Vec<Session>,
}

/// Encode sessions into the stored JSON document
pub fn encode(sessions: &[Session]) -> Result<String, StorageError> {
    Ok(serde_json::to_string_pretty(&StoredDocumentRef { sessions })?)
}

/// Decode the stored JSON document, re-parsing every instant
pub fn decode(text: &str) -> Result<Vec<Session>, StorageError> {
    let document: StoredDocument = serde_json::from_str(text)?;
    Ok(document.sessions)
}
