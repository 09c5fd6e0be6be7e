/// Session log: the append-only record of readings grouped into sessions
use log::{error, info, warn};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::export::{readings_to_csv, ExportTarget};
use crate::models::{DeviceInfo, Reading, Session, SessionStats};
use crate::storage::SessionStorage;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("no active session, reading dropped")]
    NoActiveSession,
    #[error("reading has a non-finite field, dropped")]
    NonFiniteReading,
    #[error("session index {index} out of range ({len} sessions)")]
    InvalidIndex { index: usize, len: usize },
    #[error("no readings to export")]
    NothingToExport,
}

/// Changes published to subscribers, in the order they happen.
#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    SessionStarted(Session),
    ReadingAppended { reading: Reading, data_count: usize },
    SessionEnded(Session),
    SessionDeleted { index: usize },
    Cleared,
}

/// Owns completed sessions and the single active session.
///
/// Completed sessions are persisted through the injected storage after every
/// change to that list. The active session stays in memory until it ends.
pub struct SessionLog {
    storage: Box<dyn SessionStorage>,
    sessions: Vec<Session>,
    active: Option<Session>,
    events: broadcast::Sender<LogEvent>,
}

impl SessionLog {
    /// Create a log and load previously completed sessions
    ///
    /// Storage that cannot be read is logged and the log starts empty.
    pub fn open(storage: Box<dyn SessionStorage>) -> Self {
        let sessions = match storage.load() {
            Ok(sessions) => {
                info!("Loaded {} stored sessions", sessions.len());
                sessions
            }
            Err(e) => {
                error!("Failed to load stored sessions, starting empty: {}", e);
                Vec::new()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            sessions,
            active: None,
            events,
        }
    }

    /// Subscribe to log changes; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Begin a new session for `device`
    ///
    /// A session that is still active is ended and archived first, so its
    /// readings are never lost.
    pub fn start_session(&mut self, device: DeviceInfo) -> &Session {
        if self.active.is_some() {
            warn!("Session already active, archiving it before starting a new one");
            self.end_session();
        }

        info!("Starting session for {}", device.display_name());
        let session = Session::start(device, OffsetDateTime::now_utc());
        self.publish(LogEvent::SessionStarted(session.clone()));
        self.active.insert(session)
    }

    /// Append a reading to the active session
    ///
    /// Without an active session the reading is dropped and
    /// [`LogError::NoActiveSession`] returned. A reading with a NaN or
    /// infinite field is dropped with [`LogError::NonFiniteReading`].
    pub fn append(&mut self, reading: Reading) -> Result<(), LogError> {
        let session = self.active.as_mut().ok_or(LogError::NoActiveSession)?;
        if !reading.is_finite() {
            return Err(LogError::NonFiniteReading);
        }
        session.push(reading.clone());
        let data_count = session.data_count();

        self.publish(LogEvent::ReadingAppended {
            reading,
            data_count,
        });
        Ok(())
    }

    /// End the active session, archive and persist it
    ///
    /// Returns the archived session, or None when nothing was active.
    pub fn end_session(&mut self) -> Option<&Session> {
        let mut session = self.active.take()?;
        session.finish(OffsetDateTime::now_utc());
        info!(
            "Session for {} ended with {} readings",
            session.device_info().display_name(),
            session.data_count()
        );

        self.publish(LogEvent::SessionEnded(session.clone()));
        self.sessions.push(session);
        self.persist();
        self.sessions.last()
    }

    /// Every reading of every session, newest first
    ///
    /// Readings with the same timestamp keep their arrival order.
    pub fn all_readings(&self) -> Vec<Reading> {
        let mut readings: Vec<Reading> = self
            .sessions
            .iter()
            .chain(self.active.iter())
            .flat_map(|session| session.readings().iter().cloned())
            .collect();

        // sort_by is stable
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        readings
    }

    pub fn session_statistics(&self, session: &Session) -> Option<SessionStats> {
        session.statistics_at(OffsetDateTime::now_utc())
    }

    /// Remove the completed session at `index` and persist
    pub fn delete_session(&mut self, index: usize) -> Result<Session, LogError> {
        if index >= self.sessions.len() {
            return Err(LogError::InvalidIndex {
                index,
                len: self.sessions.len(),
            });
        }

        let removed = self.sessions.remove(index);
        info!(
            "Deleted session {} ({} readings)",
            index,
            removed.data_count()
        );
        self.persist();
        self.publish(LogEvent::SessionDeleted { index });
        Ok(removed)
    }

    /// Drop every session, including the active one, and persist
    pub fn clear_all(&mut self) {
        self.sessions.clear();
        self.active = None;
        info!("Cleared all sessions");
        self.persist();
        self.publish(LogEvent::Cleared);
    }

    /// Render readings as CSV
    pub fn export_csv(&self, target: ExportTarget) -> Result<String, LogError> {
        match target {
            ExportTarget::Session(index) => {
                let session = self.sessions.get(index).ok_or(LogError::InvalidIndex {
                    index,
                    len: self.sessions.len(),
                })?;
                Ok(readings_to_csv(session.readings()))
            }
            ExportTarget::Active => {
                let session = self.active.as_ref().ok_or(LogError::NoActiveSession)?;
                Ok(readings_to_csv(session.readings()))
            }
            ExportTarget::All => {
                let readings = self.all_readings();
                if readings.is_empty() {
                    return Err(LogError::NothingToExport);
                }
                Ok(readings_to_csv(&readings))
            }
        }
    }

    // Save failures are logged; logging carries on in memory
    fn persist(&self) {
        if let Err(e) = self.storage.save(&self.sessions) {
            error!("Failed to save sessions: {}", e);
        }
    }

    fn publish(&self, event: LogEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}
