/// Single-owner loop feeding link events into the session log
use log::{info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::bluetooth::{decode_line, LinkEvent};
use crate::logger::SessionLog;

/// Owns the session log while the link is running.
///
/// Every mutation goes through this loop, so events are applied one at a
/// time and in the order the link produced them.
pub struct Dispatcher {
    log: SessionLog,
}

impl Dispatcher {
    pub fn new(log: SessionLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Apply one event. Bad lines are logged and dropped.
    pub fn handle(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::SessionStart(device) => {
                self.log.start_session(device);
            }
            LinkEvent::RawLine(line) => match decode_line(&line) {
                Ok(reading) => {
                    if let Err(e) = self.log.append(reading) {
                        warn!("{}", e);
                    }
                }
                Err(e) => warn!("Discarding line: {}", e),
            },
            LinkEvent::SessionEnd => {
                self.log.end_session();
            }
        }
    }

    /// Process events until the channel closes or `shutdown` fires
    ///
    /// On the way out the active session is ended so it gets persisted.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<LinkEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> SessionLog {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => {
                        info!("Link closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        // Drain whatever the link already delivered
        while let Ok(event) = events.try_recv() {
            self.handle(event);
        }

        if self.log.end_session().is_some() {
            info!("Active session archived on shutdown");
        }
        self.log
    }
}
