use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "relaymail")]
#[command(about = "Send outgoing mail batches through an SMTP relay", long_about = None)]
pub struct Args {
    /// Config file (YAML, TOML or JSON)
    #[arg(long, global = true, env = "RELAYMAIL_CONFIG_PATH")]
    pub config: Option<String>,

    /// Keep messages in memory instead of contacting the relay
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message, or a batch read from a JSON file
    Send(SendArgs),
    /// Open and close one connection to verify relay settings
    Check,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// JSON file holding an array of messages
    #[arg(long, conflicts_with_all = ["to", "subject", "body", "html", "from"])]
    pub batch: Option<PathBuf>,

    /// Recipient address (repeatable)
    #[arg(long)]
    pub to: Vec<String>,

    /// Sender address, defaults to the configured sender
    #[arg(long)]
    pub from: Option<String>,

    #[arg(long, default_value = "")]
    pub subject: String,

    /// Plain text body
    #[arg(long, default_value = "")]
    pub body: String,

    /// HTML alternative body
    #[arg(long)]
    pub html: Option<String>,
}
