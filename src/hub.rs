use crate::reading::Reading;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Event pushed to connected viewers. Tag names match the dashboard's
/// real-time channel contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ViewerEvent {
    #[serde(rename = "sensorData")]
    SensorData(Reading),
    #[serde(rename = "pumpStatus")]
    PumpStatus(String),
}

/// Tracks connected viewer sessions and fans inbound broker messages
/// out to all of them. Each session gets its own bounded queue, so a
/// stalled viewer loses its own events without holding up the rest.
#[derive(Clone)]
pub struct FanOutHub {
    sessions: Arc<Mutex<HashMap<Uuid, mpsc::Sender<ViewerEvent>>>>,
    commands: mpsc::Sender<String>,
    queue_depth: usize,
}

impl FanOutHub {
    pub fn new(commands: mpsc::Sender<String>, queue_depth: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            commands,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Registers a new viewer session. The returned receiver yields the
    /// session's outbound events; no catch-up snapshot is queued, the
    /// viewer sees nothing until the next broker message arrives.
    pub fn connect(&self) -> (Uuid, mpsc::Receiver<ViewerEvent>) {
        let session = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_depth);
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session, tx);
        }
        tracing::debug!(%session, "viewer connected");
        (session, rx)
    }

    /// Removes a session. Safe to call more than once.
    pub fn disconnect(&self, session: Uuid) {
        if let Ok(mut sessions) = self.sessions.lock() {
            if sessions.remove(&session).is_some() {
                tracing::debug!(%session, "viewer disconnected");
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn broadcast_reading(&self, reading: Reading) {
        self.broadcast(ViewerEvent::SensorData(reading));
    }

    pub fn broadcast_status(&self, status: String) {
        self.broadcast(ViewerEvent::PumpStatus(status));
    }

    fn broadcast(&self, event: ViewerEvent) {
        let mut stale: Vec<Uuid> = Vec::new();
        if let Ok(sessions) = self.sessions.lock() {
            for (session, tx) in sessions.iter() {
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!(%session, "viewer queue full, dropping event");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        stale.push(*session);
                    }
                }
            }
        }
        for session in stale {
            self.disconnect(session);
        }
    }

    /// Forwards a viewer-originated command to the broker client
    /// verbatim. Any connected viewer may command the device.
    pub async fn forward_command(&self, session: Uuid, command: String) {
        tracing::info!(%session, command = %command, "pump command received");
        if self.commands.send(command).await.is_err() {
            tracing::warn!(%session, "command channel closed, dropping pump command");
        }
    }
}
