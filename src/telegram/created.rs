//! Created-bot conversation state machine
//!
//! One shared handler serves every registered bot. Per subscriber it drives
//! the join-gate, the creator-only admin panel and the two awaiting states
//! (broadcast content, channel URL), and falls back to echo/relay for
//! ordinary joined subscribers.
//!
//! Authorization invariant: every admin-only transition re-checks that the
//! sender is the bot's creator. A mismatched sender silently falls through
//! to ordinary-user handling so the panel's existence never leaks.

use teloxide::types::{CallbackQueryId, ChatId, MessageId, ReplyMarkup, Update};
use url::Url;

use crate::core::{config, AppError, AppResult};
use crate::storage::db::{self, BotSubscriber, ConversationState, RegisteredBot};
use crate::storage::get_connection;
use crate::HandlerDeps;

use super::broadcast;
use super::channel::normalize_channel_url;
use super::keyboards::{self, callback};
use super::router::{self, RoutedUpdate};
use super::types::{InboundEvent, MessageContent};

/// Entry point for one created-bot webhook delivery.
pub async fn process_update(deps: &HandlerDeps, token: &str, update: &Update) -> AppResult<()> {
    let routed = router::route(deps, token, update)?;
    handle_event(deps, routed).await
}

/// Dispatch a routed event through the state machine.
pub async fn handle_event(deps: &HandlerDeps, routed: RoutedUpdate) -> AppResult<()> {
    let RoutedUpdate {
        bot,
        subscriber,
        event,
    } = routed;
    match event {
        InboundEvent::Callback {
            chat_id,
            sender_id,
            callback_id,
            data,
            ..
        } => {
            handle_callback(
                deps,
                &bot,
                &subscriber,
                chat_id,
                sender_id,
                &callback_id,
                data.as_deref(),
            )
            .await
        }
        InboundEvent::Message {
            chat_id,
            sender_id,
            content,
            ..
        } => handle_message(deps, &bot, &subscriber, chat_id, sender_id, &content).await,
    }
}

/// Channel URL for a bot, falling back to the platform default.
fn effective_channel_url(deps: &HandlerDeps, token: &str) -> AppResult<String> {
    let conn = get_connection(&deps.db_pool)?;
    Ok(db::channel_url(&conn, token)?.unwrap_or_else(|| config::DEFAULT_CHANNEL_URL.clone()))
}

fn parse_channel_url(url: &str) -> AppResult<Url> {
    Url::parse(url)
        .or_else(|_| Url::parse(&config::DEFAULT_CHANNEL_URL))
        .map_err(|_| AppError::InvalidChannelUrl(url.to_string()))
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| secs.to_string())
}

async fn handle_callback(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    subscriber: &BotSubscriber,
    chat_id: ChatId,
    sender_id: i64,
    callback_id: &CallbackQueryId,
    data: Option<&str>,
) -> AppResult<()> {
    let token = bot.token.as_str();

    if data == Some(callback::JOINED) {
        // Works for everyone, any state; duplicate taps are idempotent.
        {
            let conn = get_connection(&deps.db_pool)?;
            db::set_subscriber_joined(&conn, token, sender_id)?;
        }
        deps.gateway
            .answer_callback(token, callback_id, Some("Verified!"))
            .await?;
        deps.gateway
            .send_text(token, chat_id, "Hi, how are you?", None)
            .await?;
        return Ok(());
    }

    if sender_id != bot.creator_id {
        // Not the creator: acknowledge so the client stops spinning, do
        // nothing else.
        deps.gateway.answer_callback(token, callback_id, None).await?;
        return Ok(());
    }

    match (data, subscriber.state) {
        (Some(callback::STATS), ConversationState::AdminPanelOpen) => {
            let count = {
                let conn = get_connection(&deps.db_pool)?;
                db::joined_count(&conn, token)?
            };
            let channel = effective_channel_url(deps, token)?;
            let text = format!(
                "📊 Statistics for @{}\n\n👥 Total Users: {}\n📅 Bot Created: {}\n🔗 Channel URL: {}",
                bot.username,
                count,
                format_timestamp(bot.created_at),
                channel
            );
            deps.gateway.send_text(token, chat_id, &text, None).await?;
            deps.gateway.answer_callback(token, callback_id, None).await?;
        }
        (Some(callback::BROADCAST), ConversationState::AdminPanelOpen) => {
            let count = {
                let conn = get_connection(&deps.db_pool)?;
                db::joined_count(&conn, token)?
            };
            if count == 0 {
                deps.gateway
                    .send_text(token, chat_id, "❌ No users have joined this bot yet.", None)
                    .await?;
            } else {
                let prompt = format!(
                    "📢 Send your message or content to broadcast to {} users:",
                    count
                );
                deps.gateway
                    .send_text(
                        token,
                        chat_id,
                        &prompt,
                        Some(ReplyMarkup::InlineKeyboard(keyboards::cancel())),
                    )
                    .await?;
                let conn = get_connection(&deps.db_pool)?;
                db::set_subscriber_state(
                    &conn,
                    token,
                    sender_id,
                    ConversationState::AwaitingBroadcastContent,
                )?;
            }
            deps.gateway.answer_callback(token, callback_id, None).await?;
        }
        (Some(callback::SET_CHANNEL), ConversationState::AdminPanelOpen) => {
            let channel = effective_channel_url(deps, token)?;
            let prompt = format!(
                "🔗 Current Channel URL:\n{}\n\nEnter the new channel URL (e.g., https://t.me/your_channel):",
                channel
            );
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    &prompt,
                    Some(ReplyMarkup::InlineKeyboard(keyboards::cancel())),
                )
                .await?;
            {
                let conn = get_connection(&deps.db_pool)?;
                db::set_subscriber_state(
                    &conn,
                    token,
                    sender_id,
                    ConversationState::AwaitingChannelUrl,
                )?;
            }
            deps.gateway.answer_callback(token, callback_id, None).await?;
        }
        (Some(callback::CLOSE), ConversationState::AdminPanelOpen) => {
            if let Some(panel_id) = subscriber.panel_message_id {
                let _ = deps
                    .gateway
                    .delete_message(token, chat_id, MessageId(panel_id))
                    .await;
            }
            {
                let conn = get_connection(&deps.db_pool)?;
                db::set_panel_message(&conn, token, sender_id, None)?;
                db::set_subscriber_state(&conn, token, sender_id, ConversationState::Idle)?;
            }
            deps.gateway.answer_callback(token, callback_id, None).await?;
            deps.gateway
                .send_text(token, chat_id, "↩️ Returned to normal mode.", None)
                .await?;
        }
        (
            Some(callback::CANCEL),
            ConversationState::AwaitingBroadcastContent | ConversationState::AwaitingChannelUrl,
        ) => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "↩️ Action cancelled.",
                    Some(ReplyMarkup::InlineKeyboard(keyboards::admin_panel())),
                )
                .await?;
            {
                let conn = get_connection(&deps.db_pool)?;
                db::set_subscriber_state(
                    &conn,
                    token,
                    sender_id,
                    ConversationState::AdminPanelOpen,
                )?;
            }
            deps.gateway.answer_callback(token, callback_id, None).await?;
        }
        // Stale or unknown callback (panel reopened elsewhere, old message):
        // acknowledge and ignore.
        _ => {
            deps.gateway.answer_callback(token, callback_id, None).await?;
        }
    }
    Ok(())
}

async fn handle_message(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    subscriber: &BotSubscriber,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    let token = bot.token.as_str();
    let text = content.text();
    let is_creator = sender_id == bot.creator_id;

    if text == Some("/start") {
        handle_start(deps, bot, subscriber, chat_id, sender_id).await?;
        return Ok(());
    }

    if text == Some("/panel") && is_creator {
        open_panel(deps, bot, subscriber, chat_id, sender_id).await?;
        return Ok(());
    }

    if is_creator {
        match subscriber.state {
            ConversationState::AwaitingBroadcastContent => {
                return admin_broadcast_input(deps, bot, chat_id, sender_id, content).await;
            }
            ConversationState::AwaitingChannelUrl => {
                return admin_channel_input(deps, bot, chat_id, sender_id, content).await;
            }
            _ => {}
        }
    }

    // Default pass-through for ordinary chat members: echo by payload kind.
    // Gated on the join flag; `/panel` from a non-creator lands here and is
    // deliberately not echoed, so the command stays invisible.
    if subscriber.has_joined
        && subscriber.state == ConversationState::Idle
        && text != Some("/panel")
    {
        deps.gateway.send_content(token, chat_id, content).await?;
    }
    Ok(())
}

async fn handle_start(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    subscriber: &BotSubscriber,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    let token = bot.token.as_str();
    if subscriber.has_joined {
        deps.gateway
            .send_text(token, chat_id, "Hi, how are you?", None)
            .await?;
    } else {
        let channel = effective_channel_url(deps, token)?;
        let url = parse_channel_url(&channel)?;
        deps.gateway
            .send_text(
                token,
                chat_id,
                "Please join our channel and click on Joined button to proceed.",
                Some(ReplyMarkup::InlineKeyboard(keyboards::join_gate(&url))),
            )
            .await?;
    }
    let conn = get_connection(&deps.db_pool)?;
    db::set_subscriber_state(&conn, token, sender_id, ConversationState::Idle)?;
    Ok(())
}

async fn open_panel(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    subscriber: &BotSubscriber,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    let token = bot.token.as_str();
    // A previously tracked panel message is stale now; removal is cosmetic,
    // so a failure (already deleted, too old) is ignored.
    if let Some(panel_id) = subscriber.panel_message_id {
        let _ = deps
            .gateway
            .delete_message(token, chat_id, MessageId(panel_id))
            .await;
    }
    let message_id = deps
        .gateway
        .send_text(
            token,
            chat_id,
            "🔧 Admin Panel",
            Some(ReplyMarkup::InlineKeyboard(keyboards::admin_panel())),
        )
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_panel_message(&conn, token, sender_id, Some(message_id.0))?;
    db::set_subscriber_state(&conn, token, sender_id, ConversationState::AdminPanelOpen)?;
    Ok(())
}

async fn admin_broadcast_input(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    let token = bot.token.as_str();
    if content.text() == Some("Cancel") {
        return cancel_to_panel(deps, token, chat_id, sender_id).await;
    }

    let report = broadcast::broadcast_to_subscribers(deps, token, sender_id, content).await?;
    let summary = format!(
        "📢 Broadcast completed!\n✅ Sent to {} users\n❌ Failed for {} users",
        report.success_count, report.fail_count
    );
    deps.gateway
        .send_text(
            token,
            chat_id,
            &summary,
            Some(ReplyMarkup::InlineKeyboard(keyboards::admin_panel())),
        )
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_subscriber_state(&conn, token, sender_id, ConversationState::AdminPanelOpen)?;
    Ok(())
}

async fn admin_channel_input(
    deps: &HandlerDeps,
    bot: &RegisteredBot,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    let token = bot.token.as_str();
    if content.text() == Some("Cancel") {
        return cancel_to_panel(deps, token, chat_id, sender_id).await;
    }

    let candidate = content.text().unwrap_or_default();
    match normalize_channel_url(candidate) {
        Ok(url) => {
            {
                let conn = get_connection(&deps.db_pool)?;
                db::set_channel_url(&conn, token, &url)?;
            }
            let confirmation = format!("✅ Channel URL has been set to:\n{}", url);
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    &confirmation,
                    Some(ReplyMarkup::InlineKeyboard(keyboards::admin_panel())),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_subscriber_state(&conn, token, sender_id, ConversationState::AdminPanelOpen)?;
        }
        Err(_) => {
            // Re-prompt without changing state; the creator stays in
            // AwaitingChannelUrl until they cancel or supply a valid URL.
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "❌ Invalid URL. Please provide a valid Telegram channel URL (e.g., https://t.me/your_channel).",
                    Some(ReplyMarkup::InlineKeyboard(keyboards::cancel())),
                )
                .await?;
        }
    }
    Ok(())
}

async fn cancel_to_panel(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    deps.gateway
        .send_text(
            token,
            chat_id,
            "↩️ Action cancelled.",
            Some(ReplyMarkup::InlineKeyboard(keyboards::admin_panel())),
        )
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_subscriber_state(&conn, token, sender_id, ConversationState::AdminPanelOpen)?;
    Ok(())
}
