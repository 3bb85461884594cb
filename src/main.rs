mod app;
mod cli;
mod config;
mod models;
mod providers;
mod services;
mod ui;

use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use app::App;
use cli::CliArgs;
use config::{AppConfig, APP_NAME};
use providers::{ChatService, RagClient};
use services::chat::ChatSession;
use services::display::{DisplayFormat, Projector};
use ui::{ChatView, TerminalView};

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Ask a single question and print the whole conversation.
async fn ask_once(config: &AppConfig, service: &dyn ChatService, question: &str) -> anyhow::Result<()> {
    let mut session = ChatSession::default();
    if !session.submit(service, question, config.stage_delay()).await {
        anyhow::bail!("Nothing to ask: the question is empty");
    }

    let format = DisplayFormat::from_config(config);
    let mut view = TerminalView::new(io::stdout(), config.density);
    for row in Projector::local(&format).rows(&session) {
        view.show_message(&row);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_level.as_deref());

    let config = args
        .resolve_config(|key| std::env::var(key).ok())
        .context("Invalid configuration")?;
    tracing::info!(
        app = APP_NAME,
        version = env!("CARGO_PKG_VERSION"),
        api = %config.api_base_url,
        timeout_ms = config.request_timeout_ms,
        "Starting"
    );

    let client = RagClient::new(config.base_url()?, config.request_timeout())
        .context("Failed to create HTTP client")?;
    let service: Arc<dyn ChatService> = Arc::new(client);

    if let Some(question) = &args.ask {
        return ask_once(&config, service.as_ref(), question).await;
    }

    let view = TerminalView::new(io::stdout(), config.density);
    App::new(&config, service, view)
        .run(config.history_limit)
        .await
}
