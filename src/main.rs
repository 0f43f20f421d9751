mod bot;
mod commands;
mod config;
mod events;
mod platform;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Dispatcher;
use crate::config::Config;
use crate::events::{log_events, EventBus};
use crate::platform::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auditbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let webhook_path = config.webhook_path();
    info!("Configuration loaded successfully");
    info!("  Webhook URL: {}", config.telegram.webhook_url);
    info!("  Webhook path: {}", webhook_path);
    info!("  Listen address: {}", config.server.listen_addr);
    info!("  Bot API: {}", config.telegram.api_url);

    let transport = Arc::new(TelegramClient::new(&config.telegram)?);

    // Stand-in subscriber until the audit engine attaches its own
    let events = EventBus::new(config.events.capacity);
    tokio::spawn(log_events(events.subscribe()));

    let dispatcher = Arc::new(Dispatcher::new(
        transport,
        events,
        config.telegram.webhook_url.clone(),
    ));

    // Refuse to serve with an unregistered webhook
    dispatcher
        .initialize()
        .await
        .context("Failed to initialize bot")?;

    let app = server::router(dispatcher, &webhook_path, config.telegram.secret_token.clone());

    info!("Bot is starting...");
    server::serve(config.server.listen_addr, app).await?;

    Ok(())
}
