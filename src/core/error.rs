use thiserror::Error;

/// Centralized error types for the platform
///
/// Every failure a webhook request can produce is converted to this enum so
/// the HTTP layer has a single place to map business failures onto status
/// codes. Uses `thiserror` for conversions and display formatting.
#[derive(Error, Debug)]
pub enum AppError {
    /// No registered bot matches the token carried by the webhook path
    #[error("Bot not found")]
    UnknownBot,

    /// The inbound payload carries neither a resolvable chat id nor sender id
    #[error("Invalid update")]
    MalformedUpdate,

    /// The candidate token is already registered platform-wide
    #[error("This bot token is already in use")]
    DuplicateToken,

    /// The gateway's identity lookup did not confirm the candidate token
    #[error("Invalid bot token")]
    InvalidToken,

    /// Webhook registration against the Bot API did not succeed
    #[error("Failed to set up the webhook")]
    WebhookSetupFailed,

    /// A record lookup came up empty
    #[error("Not found: {0}")]
    NotFound(String),

    /// Channel URL normalization produced an invalid shape
    #[error("Invalid channel URL: {0}")]
    InvalidChannelUrl(String),

    /// A single outbound send failed; counted per recipient, never raised
    /// out of a broadcast loop
    #[error("Gateway send failure: {0}")]
    GatewaySendFailure(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
