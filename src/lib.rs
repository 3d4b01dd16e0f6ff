//! Botfactory - multi-tenant Telegram bot factory
//!
//! One "maker" bot lets users register bot tokens obtained from @BotFather.
//! For every registered token the platform sets a webhook and then proxies
//! all inbound updates through a shared "created-bot" handler: a join-gate,
//! an admin panel for the bot's creator (statistics, broadcast, channel URL)
//! and an echo/relay behavior for ordinary subscribers.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, broadcast pacing, web server
//! - `storage`: SQLite-backed state store (bots, subscribers, channel
//!   configs, maker users)
//! - `telegram`: gateway capability, update routing, the per-subscriber
//!   conversation state machine, broadcast engine and maker flows

pub mod core;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::HandlerDeps;
