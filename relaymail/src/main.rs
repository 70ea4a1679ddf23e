mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use relaymail_core::{
    bootstrap::{build_backend, load_config},
    logging,
    mail::{MailBackend, OutgoingMessage},
};

use cli::{Args, Command, SendArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    logging::init_logging(&config.logging)?;

    let mut backend = build_backend(&config.email, args.dry_run)?;

    match args.command {
        Command::Send(send) => {
            let messages = read_messages(send)?;
            let sent = backend.send_messages(&messages).await.map_err(|e| {
                error!("Batch failed: {e}");
                e
            })?;
            info!(sent, batch = messages.len(), "Batch finished");
            println!("{sent}");
        }
        Command::Check => {
            let opened = backend.open().await?;
            backend.close().await?;
            if !opened {
                anyhow::bail!("Could not open a connection to {}", config.email.relay_address());
            }
            println!("ok");
        }
    }

    Ok(())
}

fn read_messages(send: SendArgs) -> Result<Vec<OutgoingMessage>> {
    if let Some(path) = send.batch {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()));
    }

    let mut message = OutgoingMessage::new().subject(send.subject).text(send.body);
    message.to = send.to;
    message.from = send.from;
    message.html_body = send.html;
    Ok(vec![message])
}
