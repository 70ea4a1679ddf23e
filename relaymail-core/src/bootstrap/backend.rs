//! Backend construction

use tracing::info;

use crate::config::EmailConfig;
use crate::mail::{FreshConnectionBackend, MailBackend, MemoryBackend, SmtpBackend};
use crate::Result;

/// Build the mail backend described by `config`
///
/// Dry runs use an in-memory backend. With `fresh_connection` set, the
/// backend is wrapped so that each batch opens and closes its own connection.
pub fn build_backend(config: &EmailConfig, dry_run: bool) -> Result<Box<dyn MailBackend>> {
    let backend: Box<dyn MailBackend> = if dry_run {
        info!("Dry run: messages are kept in memory");
        Box::new(MemoryBackend::new())
    } else {
        info!(relay = %config.relay_address(), "Using SMTP backend");
        Box::new(SmtpBackend::new(config.clone())?)
    };

    if config.fresh_connection {
        Ok(Box::new(FreshConnectionBackend::new(backend)))
    } else {
        Ok(backend)
    }
}
