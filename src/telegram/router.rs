//! Update routing for created-bot webhook traffic
//!
//! Resolves an inbound payload plus its path-carried token into the owning
//! bot record, the sender's subscriber record (created on first contact) and
//! a normalized [`InboundEvent`].

use teloxide::types::{Update, UpdateKind};

use crate::core::{AppError, AppResult};
use crate::storage::db::{self, BotSubscriber, RegisteredBot};
use crate::HandlerDeps;

use super::types::{InboundEvent, MessageContent};

/// Everything the state machine needs for one update.
#[derive(Debug)]
pub struct RoutedUpdate {
    pub bot: RegisteredBot,
    pub subscriber: BotSubscriber,
    pub event: InboundEvent,
}

/// Reduce a raw update to the message/callback shapes the platform handles.
///
/// Fails with `MalformedUpdate` when neither a message nor a callback query
/// carries a resolvable chat id and sender id.
pub fn normalize(update: &Update) -> AppResult<InboundEvent> {
    match &update.kind {
        UpdateKind::Message(msg) => {
            let sender = msg.from.as_ref().ok_or(AppError::MalformedUpdate)?;
            Ok(InboundEvent::Message {
                chat_id: msg.chat.id,
                sender_id: i64::try_from(sender.id.0).map_err(|_| AppError::MalformedUpdate)?,
                sender_username: sender
                    .username
                    .clone()
                    .or_else(|| Some(sender.first_name.clone())),
                content: MessageContent::from_message(msg),
            })
        }
        UpdateKind::CallbackQuery(query) => {
            let message = query.message.as_ref().ok_or(AppError::MalformedUpdate)?;
            Ok(InboundEvent::Callback {
                chat_id: message.chat().id,
                sender_id: i64::try_from(query.from.id.0).map_err(|_| AppError::MalformedUpdate)?,
                callback_id: query.id.clone(),
                message_id: Some(message.id()),
                data: query.data.clone(),
            })
        }
        _ => Err(AppError::MalformedUpdate),
    }
}

/// Resolve `(token, update)` into a [`RoutedUpdate`].
///
/// Fails with `UnknownBot` for unregistered tokens. Lazily creates the
/// subscriber row and touches its `last_interaction_at` in the same upsert.
pub fn route(deps: &HandlerDeps, token: &str, update: &Update) -> AppResult<RoutedUpdate> {
    let conn = crate::storage::get_connection(&deps.db_pool)?;
    let bot = db::get_bot(&conn, token)?.ok_or(AppError::UnknownBot)?;
    let event = normalize(update)?;
    let subscriber = db::ensure_subscriber(
        &conn,
        token,
        event.sender_id(),
        chrono::Utc::now().timestamp(),
    )?;
    Ok(RoutedUpdate {
        bot,
        subscriber,
        event,
    })
}
