//! Thin capability wrapper around the Telegram Bot API
//!
//! Everything the platform says to Telegram goes through [`TelegramGateway`].
//! The production implementation builds a `teloxide::Bot` per call around a
//! shared HTTP client; tests substitute a recording mock. Keeping the trait
//! this narrow is what makes the state machine and the broadcast engine
//! testable without the network.

use async_trait::async_trait;
use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ChatId, InputFile, MessageId, ReplyMarkup};
use url::Url;

use crate::core::{config, AppResult};

use super::types::{BotIdentity, MessageContent};

/// Outbound capability of the Telegram Bot API, keyed by bot token.
#[async_trait]
pub trait TelegramGateway: Send + Sync {
    /// getMe for a candidate token. An error means the token is not live.
    async fn bot_identity(&self, token: &str) -> AppResult<BotIdentity>;

    /// Register the webhook for a token.
    async fn set_webhook(&self, token: &str, url: &Url) -> AppResult<()>;

    /// Deregister the webhook for a token.
    async fn delete_webhook(&self, token: &str) -> AppResult<()>;

    /// Send a text message, optionally with a keyboard. Returns the new
    /// message id so callers can track panel messages.
    async fn send_text(
        &self,
        token: &str,
        chat_id: ChatId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> AppResult<MessageId>;

    /// Reproduce a message payload by kind: text verbatim, media by file id
    /// with its original caption, voice and sticker without caption.
    async fn send_content(
        &self,
        token: &str,
        chat_id: ChatId,
        content: &MessageContent,
    ) -> AppResult<()>;

    /// Acknowledge a callback query, optionally with a toast text.
    async fn answer_callback(
        &self,
        token: &str,
        callback_id: &CallbackQueryId,
        text: Option<&str>,
    ) -> AppResult<()>;

    /// Delete a message. Callers treat failure as best-effort.
    async fn delete_message(
        &self,
        token: &str,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> AppResult<()>;
}

/// Production gateway backed by teloxide.
pub struct TeloxideGateway {
    client: reqwest::Client,
}

impl TeloxideGateway {
    /// Build the gateway with a shared HTTP client and request timeout.
    pub fn new() -> anyhow::Result<Self> {
        let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
        Ok(Self { client })
    }

    /// A `Bot` handle for one token. Cheap: the underlying client is shared.
    fn bot(&self, token: &str) -> Bot {
        Bot::with_client(token, self.client.clone())
    }
}

#[async_trait]
impl TelegramGateway for TeloxideGateway {
    async fn bot_identity(&self, token: &str) -> AppResult<BotIdentity> {
        let me = self.bot(token).get_me().await?;
        Ok(BotIdentity {
            id: i64::try_from(me.user.id.0).unwrap_or(0),
            username: me.user.username.clone().unwrap_or_default(),
        })
    }

    async fn set_webhook(&self, token: &str, url: &Url) -> AppResult<()> {
        self.bot(token).set_webhook(url.clone()).await?;
        Ok(())
    }

    async fn delete_webhook(&self, token: &str) -> AppResult<()> {
        self.bot(token).delete_webhook().await?;
        Ok(())
    }

    async fn send_text(
        &self,
        token: &str,
        chat_id: ChatId,
        text: &str,
        markup: Option<ReplyMarkup>,
    ) -> AppResult<MessageId> {
        let bot = self.bot(token);
        let request = bot.send_message(chat_id, text);
        let message = match markup {
            Some(markup) => request.reply_markup(markup).await?,
            None => request.await?,
        };
        Ok(message.id)
    }

    async fn send_content(
        &self,
        token: &str,
        chat_id: ChatId,
        content: &MessageContent,
    ) -> AppResult<()> {
        let bot = self.bot(token);
        match content {
            MessageContent::Text(text) => {
                bot.send_message(chat_id, text).await?;
            }
            MessageContent::Photo { file_id, caption } => {
                bot.send_photo(chat_id, InputFile::file_id(file_id.clone()))
                    .caption(caption.clone().unwrap_or_default())
                    .await?;
            }
            MessageContent::Document { file_id, caption } => {
                bot.send_document(chat_id, InputFile::file_id(file_id.clone()))
                    .caption(caption.clone().unwrap_or_default())
                    .await?;
            }
            MessageContent::Video { file_id, caption } => {
                bot.send_video(chat_id, InputFile::file_id(file_id.clone()))
                    .caption(caption.clone().unwrap_or_default())
                    .await?;
            }
            MessageContent::Audio { file_id, caption } => {
                bot.send_audio(chat_id, InputFile::file_id(file_id.clone()))
                    .caption(caption.clone().unwrap_or_default())
                    .await?;
            }
            MessageContent::Voice { file_id } => {
                bot.send_voice(chat_id, InputFile::file_id(file_id.clone())).await?;
            }
            MessageContent::Sticker { file_id } => {
                bot.send_sticker(chat_id, InputFile::file_id(file_id.clone())).await?;
            }
            MessageContent::Unsupported => {
                bot.send_message(chat_id, "Unsupported message type").await?;
            }
        }
        Ok(())
    }

    async fn answer_callback(
        &self,
        token: &str,
        callback_id: &CallbackQueryId,
        text: Option<&str>,
    ) -> AppResult<()> {
        let bot = self.bot(token);
        match text {
            Some(text) => {
                bot.answer_callback_query(callback_id.clone()).text(text).await?;
            }
            None => {
                bot.answer_callback_query(callback_id.clone()).await?;
            }
        }
        Ok(())
    }

    async fn delete_message(
        &self,
        token: &str,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> AppResult<()> {
        self.bot(token).delete_message(chat_id, message_id).await?;
        Ok(())
    }
}
