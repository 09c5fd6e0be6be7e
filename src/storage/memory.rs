use std::sync::{Arc, Mutex};

use super::{decode, encode, SessionStorage, StorageError};
use crate::models::Session;

/// In-memory storage that still goes through the JSON encoding.
///
/// Clones share the same document, so a test can keep a handle and inspect
/// what the log persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    document: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage preloaded with a raw document, valid or not
    pub fn with_document(text: impl Into<String>) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(text.into()))),
        }
    }

    pub fn document(&self) -> Option<String> {
        self.document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SessionStorage for MemoryStorage {
    fn save(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let text = encode(sessions)?;
        *self
            .document
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(text);
        Ok(())
    }

    fn load(&self) -> Result<Vec<Session>, StorageError> {
        match self.document() {
            Some(text) => decode(&text),
            None => Ok(Vec::new()),
        }
    }
}
