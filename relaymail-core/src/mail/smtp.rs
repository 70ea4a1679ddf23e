//! SMTP backend
//!
//! Holds a single [`AsyncSmtpConnection`] across calls. `send_messages` opens
//! a connection when none is open and closes it again only if it opened it
//! itself and every message went out; a connection opened by the caller, or
//! one left behind by a failed batch, is reused by the next call. Wrap it in
//! [`FreshConnectionBackend`](super::FreshConnectionBackend) to get a new
//! connection per batch instead.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::{
    authentication::{Credentials, Mechanism},
    client::{AsyncSmtpConnection, TlsParameters},
    extension::ClientId,
};
use tracing::{debug, error, warn};

use super::{MailBackend, OutgoingMessage};
use crate::config::EmailConfig;
use crate::logging::mask_email;
use crate::{Error, Result};

const AUTH_MECHANISMS: &[Mechanism] = &[Mechanism::Plain, Mechanism::Login];

pub struct SmtpBackend {
    config: EmailConfig,
    default_from: Mailbox,
    hello_name: ClientId,
    connection: Option<AsyncSmtpConnection>,
}

impl std::fmt::Debug for SmtpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpBackend")
            .field("relay", &self.config.relay_address())
            .field("default_from", &self.default_from.to_string())
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

impl SmtpBackend {
    /// Create a backend for the configured relay without connecting
    pub fn new(config: EmailConfig) -> Result<Self> {
        let default_from = Mailbox::new(
            config.from_name.clone(),
            config.from_email.parse::<lettre::Address>()?,
        );
        let hello_name = config
            .hello_name
            .clone()
            .map_or_else(ClientId::default, ClientId::Domain);

        Ok(Self {
            config,
            default_from,
            hello_name,
            connection: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn connect(config: &EmailConfig, hello_name: &ClientId) -> Result<AsyncSmtpConnection> {
        let implicit_tls = if config.use_ssl {
            Some(TlsParameters::new(config.host.clone())?)
        } else {
            None
        };

        let mut connection = AsyncSmtpConnection::connect_tokio1(
            (config.host.as_str(), config.port),
            config.timeout(),
            hello_name,
            implicit_tls,
            None,
        )
        .await?;

        if config.use_tls {
            let parameters = TlsParameters::new(config.host.clone())?;
            connection.starttls(parameters, hello_name).await?;
        }

        if config.has_credentials() {
            let credentials = Credentials::new(config.username.clone(), config.password.clone());
            connection.auth(AUTH_MECHANISMS, &credentials).await?;
        }

        Ok(connection)
    }

    /// Reconnect when a failed transaction left the connection unusable
    async fn replace_broken_connection(&mut self) {
        if !self
            .connection
            .as_ref()
            .is_some_and(AsyncSmtpConnection::has_broken)
        {
            return;
        }

        self.connection = None;
        match Self::connect(&self.config, &self.hello_name).await {
            Ok(connection) => {
                self.connection = Some(connection);
                debug!(relay = %self.config.relay_address(), "Reopened SMTP connection after failure");
            }
            Err(e) => {
                warn!(relay = %self.config.relay_address(), "Failed to reopen SMTP connection: {e}");
            }
        }
    }

    async fn deliver(
        connection: &mut AsyncSmtpConnection,
        default_from: &Mailbox,
        message: &OutgoingMessage,
    ) -> Result<()> {
        let email = message.to_lettre(default_from)?;
        connection.send(email.envelope(), &email.formatted()).await?;

        debug!(
            recipients = %message.recipients().map(mask_email).collect::<Vec<_>>().join(", "),
            "Message accepted by relay"
        );
        Ok(())
    }
}

#[async_trait]
impl MailBackend for SmtpBackend {
    async fn open(&mut self) -> Result<bool> {
        if self.connection.is_some() {
            return Ok(false);
        }

        match Self::connect(&self.config, &self.hello_name).await {
            Ok(connection) => {
                self.connection = Some(connection);
                debug!(relay = %self.config.relay_address(), "Opened SMTP connection");
                Ok(true)
            }
            Err(e) if self.config.fail_silently => {
                warn!(relay = %self.config.relay_address(), "Failed to open SMTP connection: {e}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        if connection.has_broken() {
            debug!(relay = %self.config.relay_address(), "Dropped broken SMTP connection");
            return Ok(());
        }

        match connection.quit().await {
            Ok(_) => {
                debug!(relay = %self.config.relay_address(), "Closed SMTP connection");
                Ok(())
            }
            Err(e) => {
                connection.abort().await;
                if self.config.fail_silently {
                    warn!(relay = %self.config.relay_address(), "Failed to close SMTP connection: {e}");
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn send_messages(&mut self, messages: &[OutgoingMessage]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }

        let created = self.open().await?;
        if self.connection.is_none() {
            // Opening failed silently
            return Ok(0);
        }

        let mut sent = 0;
        for message in messages {
            if !message.has_recipients() {
                continue;
            }
            let Some(connection) = self.connection.as_mut() else {
                // Reconnecting failed silently, the rest of the batch is dropped
                break;
            };
            let delivered = Self::deliver(connection, &self.default_from, message).await;
            match delivered {
                Ok(()) => sent += 1,
                Err(e @ Error::Smtp(_)) if self.config.fail_silently => {
                    warn!("Dropped message after send failure: {e}");
                    self.replace_broken_connection().await;
                }
                Err(e) => {
                    error!("Failed to send message: {e}");
                    return Err(e);
                }
            }
        }

        if created {
            self.close().await?;
        }
        Ok(sent)
    }
}
