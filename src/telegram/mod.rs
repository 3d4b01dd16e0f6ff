//! Telegram integration: gateway capability, update routing, the created-bot
//! conversation state machine, broadcast engine and maker-bot flows

pub mod broadcast;
pub mod channel;
pub mod created;
pub mod gateway;
pub mod keyboards;
pub mod maker;
pub mod registration;
pub mod router;
pub mod types;

use std::sync::Arc;

use crate::core::Pacer;
use crate::storage::DbPool;
use gateway::TelegramGateway;

// Re-exports for convenience
pub use gateway::TeloxideGateway;
pub use types::{InboundEvent, MessageContent};

/// Dependencies shared by every webhook handler.
///
/// There is no per-bot or per-user long-lived state in here: all
/// conversational state crosses through the store on every request.
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub gateway: Arc<dyn TelegramGateway>,
    pub pacer: Pacer,
}

impl HandlerDeps {
    /// Create new handler dependencies with the configured broadcast pacing.
    pub fn new(db_pool: Arc<DbPool>, gateway: Arc<dyn TelegramGateway>) -> Self {
        Self {
            db_pool,
            gateway,
            pacer: Pacer::from_config(),
        }
    }

    /// Override the broadcast pacer (tests use a zero delay).
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }
}
