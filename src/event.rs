use std::fmt;

use tokio::sync::{mpsc, watch};

use crate::error::{AppError, Result};
use crate::tree::{NodeId, TreePath};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

/// A human-readable message for whoever drives the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl From<&AppError> for Notification {
    fn from(err: &AppError) -> Self {
        Notification::error(err.to_string())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.level {
            Level::Info => "ℹ",
            Level::Success => "✓",
            Level::Error => "✗",
        };
        write!(f, "{} {}", marker, self.message)
    }
}

/// Workspace events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Something to show the user.
    Notify(Notification),
    /// A file was written to the sandbox and persisted.
    Saved { file_id: NodeId, path: TreePath },
    /// The sandbox reported its preview URL.
    ServerReady(String),
}

/// Channel that carries workspace events to the driver.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx, tx }
    }

    /// Get a sender clone for producers.
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Forward every preview URL published on `ready` as
    /// [`Event::ServerReady`], until either side goes away.
    pub fn forward_ready(&self, mut ready: watch::Receiver<Option<String>>) {
        let event_tx = self.tx.clone();
        tokio::spawn(async move {
            loop {
                let url = ready.borrow_and_update().clone();
                if let Some(url) = url {
                    if event_tx.send(Event::ServerReady(url)).is_err() {
                        break;
                    }
                }
                if ready.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Receive the next event (waits until available).
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Command("event channel closed".into()))
    }

    /// Take the next event if one is already queued.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}
