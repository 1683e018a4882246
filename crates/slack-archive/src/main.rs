//! Slack Archive - Channel Event Logger
//!
//! Connects to Slack over Socket Mode and writes every event from channels
//! the bot has been invited to into per-channel files under a destination
//! directory. Each event becomes one JSON line; all events from a channel
//! land in one file, in arrival order.
//!
//! # Usage
//!
//! ```bash
//! # Archive into ./archive (tokens from the environment)
//! SLACK_BOT_TOKEN=xoxb-... SLACK_APP_TOKEN=xapp-... slack-archive ./archive
//!
//! # Debug logging, react to each archived message
//! slack-archive --verbose --react ./archive
//! ```

mod slack;

use anyhow::Context;
use archive_core::{DropPolicy, FileSink, Router};
use clap::Parser;
use slack::{EventTx, SlackConnection, reaction_target};
use std::path::PathBuf;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Archiving bot for Slack.
#[derive(Parser, Debug)]
#[command(name = "slack-archive")]
#[command(about = "Writes Slack channel events to per-channel JSON-line files")]
struct Args {
    /// Destination directory for per-channel log files.
    destination: PathBuf,

    /// Slack bot token (xoxb-...), used for Web API lookups.
    #[arg(short, long, env = "SLACK_BOT_TOKEN")]
    token: String,

    /// Slack app-level token (xapp-...), used for the Socket Mode connection.
    #[arg(short, long, env = "SLACK_APP_TOKEN")]
    app_token: String,

    /// React to every archived message with an emoji.
    #[arg(short, long)]
    react: bool,

    /// Log events that arrive without a channel id instead of dropping them
    /// silently.
    #[arg(long)]
    log_dropped: bool,

    /// Be verbose.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // The destination must be usable before the connection opens.
    let sink = FileSink::new(&args.destination).with_context(|| {
        format!(
            "cannot prepare destination {}",
            args.destination.display()
        )
    })?;
    let policy = if args.log_dropped {
        DropPolicy::Warn
    } else {
        DropPolicy::Silent
    };
    let mut router = Router::new(sink, policy);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = SlackConnection::connect(&args.token, &args.app_token, EventTx(tx)).await?;
    let directory = connection.directory();

    // Set up signal handlers for graceful shutdown
    let mut sigterm = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;

    let serve = connection.serve();
    tokio::pin!(serve);

    info!("archiving to {}", args.destination.display());
    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("terminated");
                break;
            }

            _ = sigint.recv() => {
                info!("interrupted by user");
                break;
            }

            _ = &mut serve => {
                // The SDK stopped serving; nothing more will arrive.
                break;
            }

            received = rx.recv() => {
                let Some(event) = received else {
                    break;
                };
                let reaction = if args.react { reaction_target(&event) } else { None };
                // A write failure is fatal: archiving is the only job.
                router.handle(&directory, event).await?;
                if let Some((channel, ts)) = reaction {
                    connection.react(&channel, &ts).await;
                }
            }
        }
    }

    Ok(())
}
