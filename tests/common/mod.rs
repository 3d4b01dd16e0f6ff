//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use teloxide::types::{CallbackQueryId, ChatId, MessageId, ReplyMarkup, Update};
use url::Url;

use botfactory::core::{AppError, AppResult, Pacer};
use botfactory::storage::{create_pool, DbPool};
use botfactory::telegram::gateway::TelegramGateway;
use botfactory::telegram::types::{BotIdentity, MessageContent};
use botfactory::HandlerDeps;

/// One recorded outbound gateway call.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    BotIdentity {
        token: String,
    },
    SetWebhook {
        token: String,
        url: String,
    },
    DeleteWebhook {
        token: String,
    },
    SendText {
        token: String,
        chat_id: i64,
        text: String,
        has_markup: bool,
    },
    SendContent {
        token: String,
        chat_id: i64,
        content: MessageContent,
    },
    AnswerCallback {
        token: String,
        text: Option<String>,
    },
    DeleteMessage {
        token: String,
        chat_id: i64,
        message_id: i32,
    },
}

/// Recording gateway double. Every call is appended to `calls`; behavior
/// knobs make identity lookups, webhook setup or individual chat sends fail.
pub struct MockGateway {
    calls: Mutex<Vec<GatewayCall>>,
    identity: Mutex<Option<BotIdentity>>,
    webhook_fails: Mutex<bool>,
    failing_chats: Mutex<HashSet<i64>>,
    next_message_id: AtomicI32,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            identity: Mutex::new(Some(BotIdentity {
                id: 1000,
                username: "testbot".to_string(),
            })),
            webhook_fails: Mutex::new(false),
            failing_chats: Mutex::new(HashSet::new()),
            next_message_id: AtomicI32::new(100),
        }
    }

    /// Make `bot_identity` fail, as it does for a revoked or garbage token.
    pub fn deny_identity(&self) {
        *self.identity.lock().unwrap() = None;
    }

    pub fn set_identity(&self, username: &str) {
        *self.identity.lock().unwrap() = Some(BotIdentity {
            id: 1000,
            username: username.to_string(),
        });
    }

    /// Make `set_webhook` fail.
    pub fn fail_webhook(&self) {
        *self.webhook_fails.lock().unwrap() = true;
    }

    /// Make every send to `chat_id` fail, like a user who blocked the bot.
    pub fn fail_sends_to(&self, chat_id: i64) {
        self.failing_chats.lock().unwrap().insert(chat_id);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// All texts sent via `send_text`, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::SendText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Chat ids that received a `send_content` payload, in order.
    pub fn content_recipients(&self) -> Vec<i64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::SendContent { chat_id, .. } => Some(chat_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn chat_fails(&self, chat_id: i64) -> bool {
        self.failing_chats.lock().unwrap().contains(&chat_id)
    }
}

#[async_trait]
impl TelegramGateway for MockGateway {
    async fn bot_identity(&self, token: &str) -> AppResult<BotIdentity> {
        self.record(GatewayCall::BotIdentity {
            token: token.to_string(),
        });
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::GatewaySendFailure("getMe rejected".to_string()))
    }

    async fn set_webhook(&self, token: &str, url: &Url) -> AppResult<()> {
        self.record(GatewayCall::SetWebhook {
            token: token.to_string(),
            url: url.to_string(),
        });
        if *self.webhook_fails.lock().unwrap() {
            return Err(AppError::GatewaySendFailure("setWebhook rejected".to_string()));
        }
        Ok(())
    }

    async fn delete_webhook(&self, token: &str) -> AppResult<()> {
        self.record(GatewayCall::DeleteWebhook {
            token: token.to_string(),
        });
        Ok(())
    }

    async fn send_text(
        &self,
        token: &str,
        chat_id: ChatId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> AppResult<MessageId> {
        self.record(GatewayCall::SendText {
            token: token.to_string(),
            chat_id: chat_id.0,
            text: text.to_string(),
            has_markup: markup.is_some(),
        });
        if self.chat_fails(chat_id.0) {
            return Err(AppError::GatewaySendFailure("chat unavailable".to_string()));
        }
        Ok(MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn send_content(
        &self,
        token: &str,
        chat_id: ChatId,
        content: &MessageContent,
    ) -> AppResult<()> {
        self.record(GatewayCall::SendContent {
            token: token.to_string(),
            chat_id: chat_id.0,
            content: content.clone(),
        });
        if self.chat_fails(chat_id.0) {
            return Err(AppError::GatewaySendFailure("chat unavailable".to_string()));
        }
        Ok(())
    }

    async fn answer_callback(
        &self,
        token: &str,
        _callback_id: &CallbackQueryId,
        text: Option<&str>,
    ) -> AppResult<()> {
        self.record(GatewayCall::AnswerCallback {
            token: token.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        token: &str,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> AppResult<()> {
        self.record(GatewayCall::DeleteMessage {
            token: token.to_string(),
            chat_id: chat_id.0,
            message_id: message_id.0,
        });
        Ok(())
    }
}

/// Test environment: a file-backed pool in a temp dir (pooled connections
/// must share one database), a recording gateway and zero-delay pacing.
pub struct TestEnvironment {
    pub deps: HandlerDeps,
    pub gateway: Arc<MockGateway>,
    pub db_pool: Arc<DbPool>,
    _tmp: tempfile::TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        // Webhook URLs are derived from PUBLIC_URL; give the lazily-read
        // config a stable value before anything touches it.
        std::env::set_var("PUBLIC_URL", "https://factory.test");
        let tmp = tempfile::tempdir().expect("create temp dir");
        let path = tmp.path().join("test.sqlite");
        let pool = Arc::new(create_pool(path.to_str().expect("utf8 path")).expect("create pool"));
        let gateway = Arc::new(MockGateway::new());
        let deps = HandlerDeps::new(pool.clone(), gateway.clone())
            .with_pacer(Pacer::new(Duration::ZERO));
        Self {
            deps,
            gateway,
            db_pool: pool,
            _tmp: tmp,
        }
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an update the way the webhook does: from raw JSON text. The Bot
/// API update type needs a self-describing source to pick its variant.
pub fn update_from_json(value: serde_json::Value) -> Update {
    serde_json::from_str(&value.to_string()).expect("valid update json")
}

/// A private text message update, as Telegram would deliver it.
pub fn message_update(user_id: i64, text: &str) -> Update {
    update_from_json(json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "date": 1700000000,
            "chat": {"id": user_id, "type": "private", "first_name": "Test"},
            "from": {"id": user_id, "is_bot": false, "first_name": "Test", "username": "tester"},
            "text": text
        }
    }))
}

/// A photo message update carrying one size rung and a caption.
pub fn photo_update(user_id: i64, caption: Option<&str>) -> Update {
    let mut message = json!({
        "message_id": 11,
        "date": 1700000000,
        "chat": {"id": user_id, "type": "private", "first_name": "Test"},
        "from": {"id": user_id, "is_bot": false, "first_name": "Test", "username": "tester"},
        "photo": [{
            "file_id": "photo-file-id",
            "file_unique_id": "photo-unique",
            "width": 800,
            "height": 600
        }]
    });
    if let Some(caption) = caption {
        message["caption"] = json!(caption);
    }
    update_from_json(json!({"update_id": 2, "message": message}))
}

/// A callback-query update from tapping an inline button.
pub fn callback_update(user_id: i64, data: &str) -> Update {
    update_from_json(json!({
        "update_id": 3,
        "callback_query": {
            "id": "cb1",
            "from": {"id": user_id, "is_bot": false, "first_name": "Test", "username": "tester"},
            "chat_instance": "ci",
            "data": data,
            "message": {
                "message_id": 50,
                "date": 1700000000,
                "chat": {"id": user_id, "type": "private", "first_name": "Test"},
                "text": "menu"
            }
        }
    }))
}
