//! Keyboard renderers
//!
//! Every keyboard the platform shows is a pure function of state, rendered
//! here and nowhere else, so handler code cannot drift into near-duplicate
//! literals.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ReplyMarkup,
};
use url::Url;

/// Callback data understood by the created-bot state machine.
pub mod callback {
    pub const JOINED: &str = "joined";
    pub const STATS: &str = "stats";
    pub const BROADCAST: &str = "broadcast";
    pub const SET_CHANNEL: &str = "set_channel";
    pub const CLOSE: &str = "close";
    pub const CANCEL: &str = "cancel";
}

/// Join-gate prompt: a channel link next to a "Joined" confirmation button.
pub fn join_gate(channel_url: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::url("Join Channel", channel_url.clone()),
        InlineKeyboardButton::callback("✅ Joined", callback::JOINED),
    ]])
}

/// Admin panel shown to a created bot's creator.
pub fn admin_panel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 Statistics", callback::STATS)],
        vec![InlineKeyboardButton::callback("📢 Broadcast", callback::BROADCAST)],
        vec![InlineKeyboardButton::callback(
            "🔗 Set Channel URL",
            callback::SET_CHANNEL,
        )],
        vec![InlineKeyboardButton::callback("❌ Close Panel", callback::CLOSE)],
    ])
}

/// Single Cancel button for the two awaiting states.
pub fn cancel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "Cancel",
        callback::CANCEL,
    )]])
}

/// Maker bot main menu (reply keyboard; buttons arrive back as text).
pub fn maker_main_menu() -> ReplyMarkup {
    ReplyMarkup::Keyboard(KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("🛠 Create Bot")],
        vec![KeyboardButton::new("🗑️ Delete Bot")],
        vec![KeyboardButton::new("📋 My Bots")],
    ]))
}

/// Owner-only admin panel on the maker bot.
pub fn owner_panel() -> ReplyMarkup {
    ReplyMarkup::Keyboard(KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("📊 Statistics")],
        vec![KeyboardButton::new("📢 Broadcast User")],
        vec![KeyboardButton::new("📣 Broadcast Sub")],
        vec![KeyboardButton::new("🚫 Block")],
        vec![KeyboardButton::new("↩️ Back")],
    ]))
}

/// Cancel keyboard for maker-side awaiting states.
pub fn maker_cancel() -> ReplyMarkup {
    ReplyMarkup::Keyboard(KeyboardMarkup::new(vec![vec![KeyboardButton::new(
        "Cancel",
    )]]))
}

/// Back keyboard shown while the maker waits for a token.
pub fn maker_back() -> ReplyMarkup {
    ReplyMarkup::Keyboard(KeyboardMarkup::new(vec![vec![KeyboardButton::new("Back")]]))
}
