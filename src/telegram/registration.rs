//! Bot registration lifecycle
//!
//! Turns a pasted BotFather token into a live created bot: verify the token
//! against the Bot API, point its webhook at our shared endpoint, persist
//! the record. Deletion runs the same steps in reverse.

use url::Url;

use crate::core::{config, AppError, AppResult};
use crate::storage::db::{self, RegisteredBot};
use crate::storage::get_connection;
use crate::HandlerDeps;

/// Register a new created bot under `token`.
///
/// Order matters: the duplicate check comes first so a re-pasted token never
/// hits the Bot API, the identity call validates the token, and the webhook
/// must be live before the row is written. A failure at any step leaves no
/// partial registration behind.
pub async fn create_bot(
    deps: &HandlerDeps,
    token: &str,
    requester_id: i64,
    requester_username: Option<&str>,
) -> AppResult<RegisteredBot> {
    {
        let conn = get_connection(&deps.db_pool)?;
        if db::bot_exists(&conn, token)? {
            return Err(AppError::DuplicateToken);
        }
    }

    let identity = deps
        .gateway
        .bot_identity(token)
        .await
        .map_err(|err| {
            log::info!("Token verification failed: {}", err);
            AppError::InvalidToken
        })?;

    let webhook_url = Url::parse(&config::created_webhook_url(token))
        .map_err(|_| AppError::WebhookSetupFailed)?;
    deps.gateway
        .set_webhook(token, &webhook_url)
        .await
        .map_err(|err| {
            log::warn!("Webhook setup for @{} failed: {}", identity.username, err);
            AppError::WebhookSetupFailed
        })?;

    let bot = RegisteredBot {
        token: token.to_string(),
        username: identity.username,
        creator_id: requester_id,
        creator_username: requester_username.map(str::to_string),
        created_at: chrono::Utc::now().timestamp(),
    };
    {
        let conn = get_connection(&deps.db_pool)?;
        db::insert_bot(&conn, &bot)?;
    }
    log::info!(
        "Registered bot @{} for creator {}",
        bot.username,
        bot.creator_id
    );
    Ok(bot)
}

/// Delete a created bot and everything keyed on its token.
///
/// The webhook teardown is best effort: a revoked token makes the Bot API
/// call fail, but the local records must go regardless.
pub async fn delete_bot(deps: &HandlerDeps, token: &str) -> AppResult<RegisteredBot> {
    let bot = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_bot(&conn, token)?.ok_or_else(|| AppError::NotFound("bot".into()))?
    };

    if let Err(err) = deps.gateway.delete_webhook(token).await {
        log::warn!("Webhook removal for @{} failed: {}", bot.username, err);
    }

    {
        let conn = get_connection(&deps.db_pool)?;
        db::delete_bot_cascade(&conn, token)?;
    }
    log::info!("Deleted bot @{}", bot.username);
    Ok(bot)
}
