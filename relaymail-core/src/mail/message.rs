//! Outgoing message records
//!
//! An [`OutgoingMessage`] is a plain, serialisable description of one email.
//! It is converted into a [`lettre::Message`] only at send time, when the
//! backend knows the default sender.

use lettre::message::{header::ContentType, Mailbox, MultiPart};
use serde::{Deserialize, Serialize};

use crate::Result;

/// One email waiting to be sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingMessage {
    /// Sender, falls back to the backend's configured sender when absent
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// Optional HTML alternative to `body`
    pub html_body: Option<String>,
}

impl OutgoingMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    #[must_use]
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.bcc.push(address.into());
        self
    }

    #[must_use]
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to.push(address.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    /// Every envelope recipient: `to`, then `cc`, then `bcc`
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }

    #[must_use]
    pub fn has_recipients(&self) -> bool {
        self.recipients().next().is_some()
    }

    /// Build the wire message, using `default_from` when no sender is set
    pub fn to_lettre(&self, default_from: &Mailbox) -> Result<lettre::Message> {
        let from = match &self.from {
            Some(address) => address.parse::<Mailbox>()?,
            None => default_from.clone(),
        };

        let mut builder = lettre::Message::builder()
            .from(from)
            .subject(self.subject.as_str());

        for address in &self.to {
            builder = builder.to(address.parse::<Mailbox>()?);
        }
        for address in &self.cc {
            builder = builder.cc(address.parse::<Mailbox>()?);
        }
        for address in &self.bcc {
            builder = builder.bcc(address.parse::<Mailbox>()?);
        }
        for address in &self.reply_to {
            builder = builder.reply_to(address.parse::<Mailbox>()?);
        }

        let message = match &self.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                self.body.clone(),
                html.clone(),
            ))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(self.body.clone())?,
        };

        Ok(message)
    }
}
