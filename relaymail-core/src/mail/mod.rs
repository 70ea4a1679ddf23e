//! Outgoing mail
//!
//! [`MailBackend`] is the sending capability. [`SmtpBackend`] talks to a
//! relay, [`MemoryBackend`] keeps everything in process, and
//! [`FreshConnectionBackend`] wraps either one so that every batch is sent on
//! its own connection.

pub mod backend;
pub mod fresh;
pub mod memory;
pub mod message;
pub mod smtp;

pub use backend::MailBackend;
pub use fresh::FreshConnectionBackend;
pub use memory::{BackendEvent, MemoryBackend};
pub use message::OutgoingMessage;
pub use smtp::SmtpBackend;
