//! Normalized inbound/outbound message shapes
//!
//! The state machine and the broadcast engine operate only on these tagged
//! variants, never on ad hoc "which field is present" checks against the raw
//! Telegram payload.

use teloxide::types::{CallbackQueryId, ChatId, FileId, Message, MessageId};

/// What one Telegram message carries, reduced to the kinds the platform can
/// reproduce. `Unsupported` replaces everything else (polls, locations,
/// contacts, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Photo {
        file_id: FileId,
        caption: Option<String>,
    },
    Document {
        file_id: FileId,
        caption: Option<String>,
    },
    Video {
        file_id: FileId,
        caption: Option<String>,
    },
    Audio {
        file_id: FileId,
        caption: Option<String>,
    },
    Voice {
        file_id: FileId,
    },
    Sticker {
        file_id: FileId,
    },
    Unsupported,
}

impl MessageContent {
    /// Classify a raw Telegram message.
    ///
    /// For photos Telegram delivers a size ladder; the last entry is the
    /// largest rendition and the one worth re-sending.
    pub fn from_message(msg: &Message) -> Self {
        let caption = msg.caption().map(ToOwned::to_owned);
        if let Some(text) = msg.text() {
            Self::Text(text.to_owned())
        } else if let Some(sizes) = msg.photo() {
            match sizes.last() {
                Some(photo) => Self::Photo {
                    file_id: photo.file.id.clone(),
                    caption,
                },
                None => Self::Unsupported,
            }
        } else if let Some(document) = msg.document() {
            Self::Document {
                file_id: document.file.id.clone(),
                caption,
            }
        } else if let Some(video) = msg.video() {
            Self::Video {
                file_id: video.file.id.clone(),
                caption,
            }
        } else if let Some(audio) = msg.audio() {
            Self::Audio {
                file_id: audio.file.id.clone(),
                caption,
            }
        } else if let Some(voice) = msg.voice() {
            Self::Voice {
                file_id: voice.file.id.clone(),
            }
        } else if let Some(sticker) = msg.sticker() {
            Self::Sticker {
                file_id: sticker.file.id.clone(),
            }
        } else {
            Self::Unsupported
        }
    }

    /// Text payload, if this is a plain text message.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One inbound update, normalized to the two shapes the state machine
/// understands.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message {
        chat_id: ChatId,
        sender_id: i64,
        /// Sender handle, falling back to first name; kept for bot
        /// registration records.
        sender_username: Option<String>,
        content: MessageContent,
    },
    Callback {
        chat_id: ChatId,
        sender_id: i64,
        callback_id: CallbackQueryId,
        message_id: Option<MessageId>,
        data: Option<String>,
    },
}

impl InboundEvent {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Message { chat_id, .. } | Self::Callback { chat_id, .. } => *chat_id,
        }
    }

    pub fn sender_id(&self) -> i64 {
        match self {
            Self::Message { sender_id, .. } | Self::Callback { sender_id, .. } => *sender_id,
        }
    }
}

/// Identity confirmed by the Bot API for a candidate token.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: i64,
    pub username: String,
}
