//! In-memory backend
//!
//! Keeps delivered messages in an outbox and journals every connection
//! event. Nothing leaves the process, which makes it suitable for tests and
//! dry runs.

use async_trait::async_trait;
use tracing::debug;

use super::{MailBackend, OutgoingMessage};
use crate::{Error, Result};

/// Connection event recorded by [`MemoryBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEvent {
    Open,
    Close,
    /// A `send_messages` call that reached the backend, with the batch size
    Send { count: usize },
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    connected: bool,
    events: Vec<BackendEvent>,
    outbox: Vec<OutgoingMessage>,
    next_failure: Option<Error>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send_messages` call fail with `error`
    pub fn fail_next_send(&mut self, error: Error) {
        self.next_failure = Some(error);
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    #[must_use]
    pub fn outbox(&self) -> &[OutgoingMessage] {
        &self.outbox
    }

    /// Number of times `event` was recorded
    #[must_use]
    pub fn count(&self, event: BackendEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }

    /// Number of `Open` events that actually created a connection
    #[must_use]
    pub fn opens(&self) -> usize {
        self.count(BackendEvent::Open)
    }

    #[must_use]
    pub fn closes(&self) -> usize {
        self.count(BackendEvent::Close)
    }
}

#[async_trait]
impl MailBackend for MemoryBackend {
    async fn open(&mut self) -> Result<bool> {
        if self.connected {
            return Ok(false);
        }
        self.connected = true;
        self.events.push(BackendEvent::Open);
        debug!("Opened in-memory connection");
        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        self.events.push(BackendEvent::Close);
        if std::mem::take(&mut self.connected) {
            debug!("Closed in-memory connection");
        }
        Ok(())
    }

    async fn send_messages(&mut self, messages: &[OutgoingMessage]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }
        self.events.push(BackendEvent::Send {
            count: messages.len(),
        });
        if let Some(error) = self.next_failure.take() {
            return Err(error);
        }

        let created = self.open().await?;
        let mut sent = 0;
        for message in messages.iter().filter(|m| m.has_recipients()) {
            self.outbox.push(message.clone());
            sent += 1;
        }
        if created {
            self.close().await?;
        }

        debug!(sent, batch = messages.len(), "Stored messages in memory outbox");
        Ok(sent)
    }
}
