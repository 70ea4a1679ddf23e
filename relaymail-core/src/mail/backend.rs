//! Mail backend trait abstraction
//!
//! A backend owns at most one connection to a mail relay. Callers may manage
//! the connection explicitly with [`MailBackend::open`] and
//! [`MailBackend::close`], or let [`MailBackend::send_messages`] open one on
//! demand.

use async_trait::async_trait;

use super::OutgoingMessage;
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailBackend: Send {
    /// Ensure a connection is open
    ///
    /// Returns `true` when a new connection was created and `false` when one
    /// was already open, or when opening failed and the backend is configured
    /// to fail silently.
    async fn open(&mut self) -> Result<bool>;

    /// Close the current connection, if any
    ///
    /// Closing an absent or already-closed connection succeeds.
    async fn close(&mut self) -> Result<()>;

    /// Send a batch of messages and return how many were sent
    async fn send_messages(&mut self, messages: &[OutgoingMessage]) -> Result<usize>;
}

#[async_trait]
impl<B: MailBackend + ?Sized> MailBackend for Box<B> {
    async fn open(&mut self) -> Result<bool> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }

    async fn send_messages(&mut self, messages: &[OutgoingMessage]) -> Result<usize> {
        (**self).send_messages(messages).await
    }
}
