//! inbox-triage-rs: Web inbox triage with drafted multilingual replies
//!
//! This server lists recent messages of one mailbox account, ranks them by
//! urgency, drafts replies in a chosen language via a text-completion
//! backend, and sends the edited reply back into the original thread.
//!
//! # Architecture
//!
//! - [`main`]: Process entry point with env loading and HTTP serving
//! - [`config`]: Environment-driven configuration for secrets and server settings
//! - [`errors`]: Application error model with HTTP status mapping
//! - [`gmail`]: Mailbox adapter with OAuth refresh and token caching
//! - [`completion`]: Text-completion adapter
//! - [`server`]: HTTP handlers with validation and orchestration
//! - [`models`]: Mailbox records and request/response DTOs
//! - [`mime`]: Body extraction and HTML-to-text normalization
//! - [`triage`]: Prompts and defensive parsing of completion output
//! - [`reply`]: Greeting/signature templates and the reply envelope
//! - [`page`]: Server-rendered inbox page
//! - [`message_id`]: Message id validation

mod completion;
mod config;
mod errors;
mod gmail;
mod message_id;
mod mime;
mod models;
mod page;
mod reply;
mod server;
mod triage;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use config::ServerConfig;
use tracing_subscriber::EnvFilter;

/// Command-line overrides for environment configuration
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Listen address, overrides INBOX_TRIAGE_BIND
    #[arg(long)]
    bind: Option<SocketAddr>,
}

/// Application entry point
///
/// Initializes tracing from environment, loads config, builds the mailbox
/// and completion adapters once, and serves HTTP until Ctrl-C.
///
/// # Environment Variables
///
/// See [`ServerConfig::load_from_env`] for full configuration options.
///
/// # Example
///
/// ```no_run
/// CLIENT_ID=1234.apps.googleusercontent.com \
/// CLIENT_SECRET=secret \
/// REFRESH_TOKEN=1//0g... \
/// GEMINI_API_KEY=AIza... \
/// cargo run -- --bind 127.0.0.1:8080
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::load_from_env()?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    let timeout = Duration::from_millis(config.request_timeout_ms);

    let mailbox = gmail::GmailClient::new(
        gmail::OAuthCredential::new(&config.oauth),
        &config.gmail_endpoint,
        timeout,
    )?;
    let completion = completion::GeminiClient::new(&config.completion, timeout)?;
    let app = server::TriageServer::new(
        server::TriageSettings::from(&config),
        Arc::new(mailbox),
        Arc::new(completion),
    )
    .router();

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}
