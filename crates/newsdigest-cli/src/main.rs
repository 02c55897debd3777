use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdigest_core::mail::oauth::DEFAULT_REDIRECT_URI;
use newsdigest_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "newsdigest")]
#[command(author, version, about = "Mail a keyword news digest from RSS and Atom feeds")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config.toml (default: ~/.config/newsdigest/config.toml)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every job's feed and mail its digest
    Run,
    /// Build digests without sending them
    Preview {
        /// Only preview the job with this tag
        #[arg(short = 't', long)]
        tag: Option<String>,
        /// Print the HTML body instead of plain text
        #[arg(long)]
        html: bool,
        /// Write <tag>.txt and <tag>.html into this directory
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Obtain a Gmail refresh token through the OAuth consent flow
    Auth {
        /// Redirect URI registered for the OAuth client
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::debug!("Loaded {} job(s)", config.jobs.len());

    match cli.command {
        Some(Commands::Run) | None => commands::run::run(&config).await,
        Some(Commands::Preview { tag, html, output }) => {
            commands::preview::run(&config, tag.as_deref(), html, output.as_deref()).await
        }
        Some(Commands::Auth { redirect_uri }) => commands::auth::run(&config, &redirect_uri).await,
    }
}
