//! Webhook HTTP endpoint.
//!
//! Every request the platform sends gets a 200, whatever happens while
//! handling it; a failure response would make Telegram redeliver the update.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use tracing::{error, info, warn};

use crate::bot::Dispatcher;
use crate::platform::telegram::decode_update;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

#[derive(Clone)]
struct ServerState {
    dispatcher: Arc<Dispatcher>,
    secret_token: Option<Arc<str>>,
}

pub fn router(
    dispatcher: Arc<Dispatcher>,
    webhook_path: &str,
    secret_token: Option<String>,
) -> Router {
    let state = ServerState {
        dispatcher,
        secret_token: secret_token.map(Arc::from),
    };

    Router::new()
        .route("/health", get(health))
        .route(webhook_path, post(receive_update))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening for webhook updates on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn receive_update(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = &state.secret_token {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_ref()) {
            warn!("Rejected webhook request with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update = match decode_update(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Dropping undecodable update: {:#}", e);
            return StatusCode::OK;
        }
    };

    // Runs detached so a dropped connection cannot cut handling short
    let dispatcher = state.dispatcher.clone();
    let handling = tokio::spawn(async move { dispatcher.handle_update(update).await });
    if let Err(e) = handling.await {
        error!("Update handling task failed: {}", e);
    }

    StatusCode::OK
}
