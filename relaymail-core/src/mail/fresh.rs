//! Connection-per-batch sending
//!
//! Worker processes cannot share a socket opened by another process, and a
//! connection kept open between batches may have been dropped by the relay in
//! the meantime. [`FreshConnectionBackend`] makes every batch start from a
//! closed connection and end with one, whatever the outcome of the send.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{MailBackend, OutgoingMessage};
use crate::Result;

/// Wraps a backend so each `send_messages` call gets its own connection
#[derive(Debug, Default)]
pub struct FreshConnectionBackend<B> {
    inner: B,
}

impl<B: MailBackend> FreshConnectionBackend<B> {
    pub const fn new(inner: B) -> Self {
        Self { inner }
    }

    pub const fn inner(&self) -> &B {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }

    /// Close the inner connection, logging instead of returning a failure
    async fn release(&mut self, stage: &'static str) {
        if let Err(e) = self.inner.close().await {
            warn!(stage, "Failed to close mail connection: {e}");
        }
    }
}

#[async_trait]
impl<B: MailBackend> MailBackend for FreshConnectionBackend<B> {
    async fn open(&mut self) -> Result<bool> {
        self.inner.open().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    async fn send_messages(&mut self, messages: &[OutgoingMessage]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }

        self.release("before_send").await;
        let result = self.inner.send_messages(messages).await;
        self.release("after_send").await;

        if let Ok(sent) = &result {
            debug!(sent, batch = messages.len(), "Sent batch on fresh connection");
        }
        result
    }
}
