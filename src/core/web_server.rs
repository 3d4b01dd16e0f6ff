//! Webhook HTTP server.
//!
//! Two POST endpoints carry all traffic: `/created?token=<botToken>` for
//! updates addressed to any registered bot, `/maker` for updates addressed
//! to the maker bot itself. GET on either path answers a plain liveness
//! string so the upstream platform's health probes stay green.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use teloxide::types::Update;
use tokio::net::TcpListener;

use crate::core::{config, AppError};
use crate::telegram::{created, maker};
use crate::HandlerDeps;

#[derive(Clone)]
struct WebState {
    deps: HandlerDeps,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Build the webhook router. Split out from [`start_web_server`] so tests
/// can drive it without binding a socket.
pub fn router(deps: HandlerDeps) -> Router {
    let state = WebState { deps };
    Router::new()
        .route("/created", get(created_liveness).post(created_webhook))
        .route("/maker", get(maker_liveness).post(maker_webhook))
        .route("/health", get(health))
        .with_state(state)
}

/// Start the webhook server.
pub async fn start_web_server(port: u16, deps: HandlerDeps) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(deps);

    log::info!("Starting webhook server on http://{}", addr);
    log::info!("  POST /created?token=<token> - created-bot updates");
    log::info!("  POST /maker                 - maker-bot updates");
    log::info!("  GET  /health                - health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn created_liveness() -> &'static str {
    "Created Bot is running."
}

async fn maker_liveness() -> &'static str {
    "Bot Maker is running."
}

/// POST /created?token=<botToken>
///
/// The update is decoded straight from the body bytes: the Bot API update
/// type needs a self-describing source to pick its variant, so the payload
/// must never take a detour through an intermediate JSON value.
async fn created_webhook(
    State(state): State<WebState>,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "No token provided"})),
        )
            .into_response();
    };
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            log::warn!("Undecodable created-bot update: {}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid update"})),
            )
                .into_response();
        }
    };

    match created::process_update(&state.deps, &token, &update).await {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))).into_response(),
        Err(err) => error_response(err),
    }
}

/// POST /maker
async fn maker_webhook(State(state): State<WebState>, body: Bytes) -> Response {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            log::warn!("Undecodable maker-bot update: {}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid update"})),
            )
                .into_response();
        }
    };

    match maker::process_update(
        &state.deps,
        &config::MAKER_BOT_TOKEN,
        *config::OWNER_ID,
        &update,
    )
    .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))).into_response(),
        Err(err) => error_response(err),
    }
}

/// Map handler errors onto the webhook response contract.
fn error_response(err: AppError) -> Response {
    match err {
        AppError::UnknownBot => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Bot not found"})),
        )
            .into_response(),
        AppError::MalformedUpdate => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid update"})),
        )
            .into_response(),
        other => {
            log::error!("Webhook handling failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": other.to_string()})),
            )
                .into_response()
        }
    }
}
