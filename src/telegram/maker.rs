//! Maker bot handler
//!
//! The front desk of the platform: end users paste BotFather tokens here to
//! register or delete bots, and the owner runs platform-wide administration
//! (statistics, two broadcast audiences, blocking) through a reply-keyboard
//! panel. All navigation is text-driven because reply keyboards send their
//! labels back as plain messages.

use teloxide::types::{ChatId, Update};

use crate::core::{AppError, AppResult};
use crate::storage::db::{self, MakerAdminState, MakerStep};
use crate::storage::get_connection;
use crate::HandlerDeps;

use super::broadcast;
use super::keyboards;
use super::registration;
use super::router;
use super::types::{InboundEvent, MessageContent};

/// How many bots the owner statistics screen ranks.
const TOP_BOTS_LIMIT: i64 = 20;

/// Entry point for one maker-bot webhook delivery.
pub async fn process_update(
    deps: &HandlerDeps,
    maker_token: &str,
    owner_id: i64,
    update: &Update,
) -> AppResult<()> {
    match router::normalize(update)? {
        // The maker bot only renders reply keyboards; a stray callback from
        // an old inline message just gets acknowledged.
        InboundEvent::Callback { callback_id, .. } => {
            deps.gateway
                .answer_callback(maker_token, &callback_id, None)
                .await
        }
        InboundEvent::Message {
            chat_id,
            sender_id,
            sender_username,
            content,
        } => {
            handle_message(
                deps,
                maker_token,
                owner_id,
                chat_id,
                sender_id,
                sender_username.as_deref(),
                &content,
            )
            .await
        }
    }
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[allow(clippy::too_many_arguments)]
async fn handle_message(
    deps: &HandlerDeps,
    token: &str,
    owner_id: i64,
    chat_id: ChatId,
    sender_id: i64,
    sender_username: Option<&str>,
    content: &MessageContent,
) -> AppResult<()> {
    let text = content.text();

    match text {
        Some("/start") => return handle_start(deps, token, chat_id, sender_id).await,
        Some("/panel") => return handle_panel(deps, token, owner_id, chat_id, sender_id).await,
        Some("/clear") => return handle_clear(deps, token, owner_id, chat_id, sender_id).await,
        _ => {}
    }

    let user = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_maker_user(&conn, sender_id)?
    };
    let Some(user) = user else {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "Please start the bot with /start.",
                Some(keyboards::maker_main_menu()),
            )
            .await?;
        return Ok(());
    };
    if user.is_blocked {
        deps.gateway
            .send_text(token, chat_id, "🚫 You have been banned by the admin.", None)
            .await?;
        return Ok(());
    }

    // Main-menu labels take priority over any pending step or admin state.
    match text {
        Some("🛠 Create Bot") => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "Send your bot token from @BotFather to make your bot:",
                    Some(keyboards::maker_back()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::CreateBot)?;
            return Ok(());
        }
        Some("🗑️ Delete Bot") => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "Send your created bot token you want to delete:",
                    Some(keyboards::maker_back()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::DeleteBot)?;
            return Ok(());
        }
        Some("📋 My Bots") => return list_bots(deps, token, chat_id, sender_id).await,
        _ => {}
    }

    let is_owner = sender_id == owner_id;
    if is_owner && user.admin_state == MakerAdminState::AdminPanel {
        if let Some(label) = text {
            if handle_panel_label(deps, token, chat_id, sender_id, label).await? {
                return Ok(());
            }
        }
    }
    if is_owner {
        match user.admin_state {
            MakerAdminState::AwaitingBroadcastUser => {
                return broadcast_user_input(deps, token, chat_id, sender_id, content).await;
            }
            MakerAdminState::AwaitingBroadcastSub => {
                return broadcast_sub_input(deps, token, chat_id, sender_id, content).await;
            }
            MakerAdminState::AwaitingBlock => {
                return block_input(deps, token, owner_id, chat_id, sender_id, content).await;
            }
            _ => {}
        }
    }

    // "Back" cancels whatever step is pending, which is exactly what the
    // keyboard shown with the token prompts offers.
    if text == Some("Back") {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "↩️ Back to main menu.",
                Some(keyboards::maker_main_menu()),
            )
            .await?;
        let conn = get_connection(&deps.db_pool)?;
        db::set_maker_step(&conn, sender_id, MakerStep::None)?;
        db::set_maker_admin_state(&conn, sender_id, MakerAdminState::None)?;
        return Ok(());
    }

    match user.step {
        MakerStep::CreateBot => {
            create_bot_input(deps, token, chat_id, sender_id, sender_username, content).await
        }
        MakerStep::DeleteBot => delete_bot_input(deps, token, chat_id, sender_id, content).await,
        MakerStep::None => Ok(()),
    }
}

async fn handle_start(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    let blocked = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_maker_user(&conn, sender_id)?.is_some_and(|u| u.is_blocked)
    };
    if blocked {
        deps.gateway
            .send_text(token, chat_id, "🚫 You have been banned by the admin.", None)
            .await?;
        return Ok(());
    }
    {
        let conn = get_connection(&deps.db_pool)?;
        db::reset_maker_user(&conn, sender_id)?;
    }
    deps.gateway
        .send_text(
            token,
            chat_id,
            "Welcome to Bot Maker! Use the buttons below to create and manage your Telegram bots.",
            Some(keyboards::maker_main_menu()),
        )
        .await?;
    Ok(())
}

async fn handle_panel(
    deps: &HandlerDeps,
    token: &str,
    owner_id: i64,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    if sender_id != owner_id {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "❌ You are not authorized to use this command.",
                None,
            )
            .await?;
        return Ok(());
    }
    {
        let conn = get_connection(&deps.db_pool)?;
        db::ensure_maker_user(&conn, sender_id)?;
        db::set_maker_step(&conn, sender_id, MakerStep::None)?;
        db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
    }
    deps.gateway
        .send_text(
            token,
            chat_id,
            "🔧 Owner Admin Panel",
            Some(keyboards::owner_panel()),
        )
        .await?;
    Ok(())
}

async fn handle_clear(
    deps: &HandlerDeps,
    token: &str,
    owner_id: i64,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    if sender_id != owner_id {
        log::warn!("Unauthorized /clear attempt from {}", sender_id);
        deps.gateway
            .send_text(
                token,
                chat_id,
                "❌ You are not authorized to use this command.",
                None,
            )
            .await?;
        return Ok(());
    }
    {
        let conn = get_connection(&deps.db_pool)?;
        db::clear_all(&conn)?;
    }
    log::info!("All platform data cleared by owner");
    deps.gateway
        .send_text(
            token,
            chat_id,
            "✅ All data has been cleared. Bot Maker is reset.",
            None,
        )
        .await?;
    Ok(())
}

async fn list_bots(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
) -> AppResult<()> {
    let bots = {
        let conn = get_connection(&deps.db_pool)?;
        db::bots_by_creator(&conn, sender_id)?
    };
    let mut message = String::from("📋 Your Bots:\n\n");
    if bots.is_empty() {
        message.push_str("You have not created any bots yet.");
    } else {
        for bot in &bots {
            message.push_str(&format!(
                "🤖 @{}\nCreated At: {}\n\n",
                bot.username,
                format_timestamp(bot.created_at)
            ));
        }
    }
    deps.gateway
        .send_text(token, chat_id, &message, Some(keyboards::maker_main_menu()))
        .await?;
    Ok(())
}

/// Owner panel labels. Returns `false` when the text was not a panel label,
/// so the caller can keep dispatching.
async fn handle_panel_label(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    label: &str,
) -> AppResult<bool> {
    match label {
        "📊 Statistics" => {
            let (total_users, total_bots, top_bots) = {
                let conn = get_connection(&deps.db_pool)?;
                (
                    db::count_maker_users(&conn)?,
                    db::count_bots(&conn)?,
                    db::top_bots_by_subscribers(&conn, TOP_BOTS_LIMIT)?,
                )
            };
            let mut stats = format!(
                "📊 Bot Maker Statistics\n\n👥 Total Users: {}\n🤖 Total Bots Created: {}\n\n🏆 Top {} Bots by User Count:\n\n",
                total_users, total_bots, TOP_BOTS_LIMIT
            );
            if top_bots.is_empty() {
                stats.push_str("No bots created yet.");
            } else {
                for (index, (bot, subscriber_count)) in top_bots.iter().enumerate() {
                    stats.push_str(&format!(
                        "🔹 #{}\nBot: @{}\nCreator: @{}\nToken: {}\nUsers: {}\nCreated At: {}\n\n",
                        index + 1,
                        bot.username,
                        bot.creator_username.as_deref().unwrap_or("Unknown"),
                        bot.token,
                        subscriber_count,
                        format_timestamp(bot.created_at)
                    ));
                }
            }
            deps.gateway
                .send_text(token, chat_id, &stats, Some(keyboards::owner_panel()))
                .await?;
        }
        "📢 Broadcast User" => {
            let count = {
                let conn = get_connection(&deps.db_pool)?;
                db::count_maker_users(&conn)?
            };
            if count == 0 {
                deps.gateway
                    .send_text(
                        token,
                        chat_id,
                        "❌ No users have joined Bot Maker yet.",
                        Some(keyboards::owner_panel()),
                    )
                    .await?;
            } else {
                let prompt = format!(
                    "📢 Send your message or content to broadcast to {} Bot Maker users:",
                    count
                );
                deps.gateway
                    .send_text(token, chat_id, &prompt, Some(keyboards::maker_cancel()))
                    .await?;
                let conn = get_connection(&deps.db_pool)?;
                db::set_maker_admin_state(
                    &conn,
                    sender_id,
                    MakerAdminState::AwaitingBroadcastUser,
                )?;
            }
        }
        "📣 Broadcast Sub" => {
            let count = {
                let conn = get_connection(&deps.db_pool)?;
                db::distinct_joined_user_ids(&conn)?.len()
            };
            if count == 0 {
                deps.gateway
                    .send_text(
                        token,
                        chat_id,
                        "❌ No users have joined any created bots yet.",
                        Some(keyboards::owner_panel()),
                    )
                    .await?;
            } else {
                let prompt = format!(
                    "📣 Send your message or content to broadcast to {} users of created bots:",
                    count
                );
                deps.gateway
                    .send_text(token, chat_id, &prompt, Some(keyboards::maker_cancel()))
                    .await?;
                let conn = get_connection(&deps.db_pool)?;
                db::set_maker_admin_state(
                    &conn,
                    sender_id,
                    MakerAdminState::AwaitingBroadcastSub,
                )?;
            }
        }
        "🚫 Block" => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "🚫 Enter the user ID of the account you want to block from Bot Maker:",
                    Some(keyboards::maker_cancel()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AwaitingBlock)?;
        }
        "↩️ Back" => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "↩️ Back to main menu.",
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::None)?;
            db::set_maker_admin_state(&conn, sender_id, MakerAdminState::None)?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

async fn broadcast_user_input(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    if content.text() == Some("Cancel") {
        return cancel_to_owner_panel(deps, token, chat_id, sender_id, "↩️ Broadcast cancelled.")
            .await;
    }

    let recipients = {
        let conn = get_connection(&deps.db_pool)?;
        db::unblocked_maker_user_ids(&conn)?
    };
    let report = broadcast::broadcast_content(
        deps.gateway.as_ref(),
        token,
        &recipients,
        sender_id,
        content,
        &deps.pacer,
    )
    .await;
    let summary = format!(
        "📢 Broadcast to Bot Maker Users completed!\n✅ Sent to {} users\n❌ Failed for {} users",
        report.success_count, report.fail_count
    );
    deps.gateway
        .send_text(token, chat_id, &summary, Some(keyboards::owner_panel()))
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
    Ok(())
}

async fn broadcast_sub_input(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    if content.text() == Some("Cancel") {
        return cancel_to_owner_panel(deps, token, chat_id, sender_id, "↩️ Broadcast cancelled.")
            .await;
    }

    // Deduplicated across bots, and sent through the maker token: a recipient
    // who never opened the maker bot counts as a failure.
    let recipients = {
        let conn = get_connection(&deps.db_pool)?;
        db::distinct_joined_user_ids(&conn)?
    };
    let report = broadcast::broadcast_content(
        deps.gateway.as_ref(),
        token,
        &recipients,
        sender_id,
        content,
        &deps.pacer,
    )
    .await;
    let summary = format!(
        "📣 Broadcast to Created Bot Users completed!\n✅ Sent to {} users\n❌ Failed for {} users",
        report.success_count, report.fail_count
    );
    deps.gateway
        .send_text(token, chat_id, &summary, Some(keyboards::owner_panel()))
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
    Ok(())
}

async fn block_input(
    deps: &HandlerDeps,
    token: &str,
    owner_id: i64,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    if content.text() == Some("Cancel") {
        return cancel_to_owner_panel(deps, token, chat_id, sender_id, "↩️ Block action cancelled.")
            .await;
    }

    let input = content.text().unwrap_or_default().trim();
    let Ok(target_id) = input.parse::<i64>() else {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "❌ Invalid user ID. Please provide a numeric user ID.",
                Some(keyboards::maker_cancel()),
            )
            .await?;
        return Ok(());
    };
    if target_id == owner_id {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "❌ You cannot block yourself.",
                Some(keyboards::maker_cancel()),
            )
            .await?;
        return Ok(());
    }

    let target_exists = {
        let conn = get_connection(&deps.db_pool)?;
        db::get_maker_user(&conn, target_id)?.is_some()
    };
    if !target_exists {
        deps.gateway
            .send_text(
                token,
                chat_id,
                "❌ User not found.",
                Some(keyboards::owner_panel()),
            )
            .await?;
        let conn = get_connection(&deps.db_pool)?;
        db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
        return Ok(());
    }

    {
        let conn = get_connection(&deps.db_pool)?;
        db::set_maker_blocked(&conn, target_id, true)?;
        db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
    }
    log::info!("User {} blocked by owner", target_id);
    let confirmation = format!("✅ User {} has been blocked from Bot Maker.", target_id);
    deps.gateway
        .send_text(token, chat_id, &confirmation, Some(keyboards::owner_panel()))
        .await?;
    Ok(())
}

async fn create_bot_input(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    sender_username: Option<&str>,
    content: &MessageContent,
) -> AppResult<()> {
    // A non-text payload yields an empty candidate, which fails validation
    // like any other bad token.
    let candidate = content.text().unwrap_or_default().trim().to_string();
    match registration::create_bot(deps, &candidate, sender_id, sender_username).await {
        Ok(bot) => {
            let confirmation = format!(
                "✅ Your bot @{} made successfully! Send /panel to manage it.",
                bot.username
            );
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    &confirmation,
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::None)?;
        }
        Err(AppError::InvalidToken) => {
            // Stay in the step so the user can paste a corrected token.
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "❌ Invalid bot token. Please try again:",
                    Some(keyboards::maker_back()),
                )
                .await?;
        }
        Err(AppError::DuplicateToken) => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "❌ This bot token is already in use.",
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::None)?;
        }
        Err(AppError::WebhookSetupFailed) => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "❌ Failed to set up the bot. Please try again.",
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
            let conn = get_connection(&deps.db_pool)?;
            db::set_maker_step(&conn, sender_id, MakerStep::None)?;
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

async fn delete_bot_input(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<()> {
    let candidate = content.text().unwrap_or_default().trim().to_string();
    match registration::delete_bot(deps, &candidate).await {
        Ok(_) => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "✅ Bot has been deleted and disconnected from Bot Maker.",
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
        }
        Err(AppError::NotFound(_)) => {
            deps.gateway
                .send_text(
                    token,
                    chat_id,
                    "❌ Bot token not found.",
                    Some(keyboards::maker_main_menu()),
                )
                .await?;
        }
        Err(err) => return Err(err),
    }
    let conn = get_connection(&deps.db_pool)?;
    db::set_maker_step(&conn, sender_id, MakerStep::None)?;
    Ok(())
}

async fn cancel_to_owner_panel(
    deps: &HandlerDeps,
    token: &str,
    chat_id: ChatId,
    sender_id: i64,
    message: &str,
) -> AppResult<()> {
    deps.gateway
        .send_text(token, chat_id, message, Some(keyboards::owner_panel()))
        .await?;
    let conn = get_connection(&deps.db_pool)?;
    db::set_maker_admin_state(&conn, sender_id, MakerAdminState::AdminPanel)?;
    Ok(())
}
