//! Broadcast fan-out engine
//!
//! Sends one authored payload to a recipient list, sequentially, pausing a
//! fixed interval between sends to respect the Bot API rate ceiling. One
//! recipient failing never aborts the batch; the loop only keeps aggregate
//! counts.

use teloxide::types::ChatId;

use crate::core::{AppResult, Pacer};
use crate::storage::db;
use crate::HandlerDeps;

use super::gateway::TelegramGateway;
use super::types::MessageContent;

/// Aggregate outcome of one fan-out. No per-recipient results are retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub success_count: u32,
    pub fail_count: u32,
}

/// Fan one payload out to `recipients`, skipping the sender.
///
/// Deliberately sequential: the pacing delay after each successful send is
/// the rate-limit compliance mechanism, so parallelizing would defeat it.
/// Failures are logged and counted, never retried.
pub async fn broadcast_content(
    gateway: &dyn TelegramGateway,
    token: &str,
    recipients: &[i64],
    sender_id: i64,
    content: &MessageContent,
    pacer: &Pacer,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &user_id in recipients {
        if user_id == sender_id {
            continue;
        }
        match gateway.send_content(token, ChatId(user_id), content).await {
            Ok(()) => {
                report.success_count += 1;
                pacer.pause().await;
            }
            Err(err) => {
                log::warn!("Broadcast send to {} failed: {}", user_id, err);
                report.fail_count += 1;
            }
        }
    }
    report
}

/// Fan out to every joined subscriber of one bot, excluding the sender.
pub async fn broadcast_to_subscribers(
    deps: &HandlerDeps,
    token: &str,
    sender_id: i64,
    content: &MessageContent,
) -> AppResult<BroadcastReport> {
    let recipients = {
        let conn = crate::storage::get_connection(&deps.db_pool)?;
        db::joined_subscriber_ids(&conn, token)?
    };
    Ok(broadcast_content(
        deps.gateway.as_ref(),
        token,
        &recipients,
        sender_id,
        content,
        &deps.pacer,
    )
    .await)
}
