use once_cell::sync::Lazy;
use std::env;
use url::Url;

/// Configuration constants for the platform

/// Token of the maker bot itself
/// Read once at startup from MAKER_BOT_TOKEN environment variable
pub static MAKER_BOT_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("MAKER_BOT_TOKEN").unwrap_or_default());

/// Telegram user id of the platform owner
/// Read from OWNER_ID environment variable; 0 means "not configured"
pub static OWNER_ID: Lazy<i64> = Lazy::new(|| {
    env::var("OWNER_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
});

/// Externally reachable base URL of this deployment
/// Used to build per-bot webhook URLs, e.g. https://factory.example.com
pub static PUBLIC_URL: Lazy<String> = Lazy::new(|| env::var("PUBLIC_URL").unwrap_or_default());

/// SQLite database file path
/// Read from DATABASE_PATH environment variable
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "botfactory.sqlite".to_string()));

/// HTTP port for the webhook server
pub static PORT: Lazy<u16> = Lazy::new(|| {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
});

/// Log file path
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "botfactory.log".to_string()));

/// Fallback channel URL used by the join-gate when a bot's creator has not
/// configured one
pub static DEFAULT_CHANNEL_URL: Lazy<String> = Lazy::new(|| {
    env::var("DEFAULT_CHANNEL_URL").unwrap_or_else(|_| "https://t.me/Kali_Linux_BOTS".to_string())
});

/// Verify that every required environment variable is present.
///
/// Missing values are a fatal startup condition, not a runtime error:
/// the process must refuse to start rather than serve webhooks it
/// cannot answer.
pub fn validate() -> anyhow::Result<()> {
    if MAKER_BOT_TOKEN.is_empty() {
        anyhow::bail!("MAKER_BOT_TOKEN environment variable not set");
    }
    if *OWNER_ID == 0 {
        anyhow::bail!("OWNER_ID environment variable not set or not numeric");
    }
    if PUBLIC_URL.is_empty() {
        anyhow::bail!("PUBLIC_URL environment variable not set");
    }
    Url::parse(&PUBLIC_URL).map_err(|e| anyhow::anyhow!("Invalid PUBLIC_URL: {}", e))?;
    Ok(())
}

/// Build the webhook URL registered for a created bot's token.
pub fn created_webhook_url(token: &str) -> String {
    format!(
        "{}/created?token={}",
        PUBLIC_URL.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}

/// Broadcast configuration
pub mod broadcast {
    use std::time::Duration;

    /// Fixed delay between consecutive sends during a fan-out (in
    /// milliseconds). Keeps a full-speed broadcast under the Bot API's
    /// ~30 messages/second ceiling.
    pub const PACE_DELAY_MS: u64 = 34;

    /// Inter-message pacing delay
    pub fn pace_delay() -> Duration {
        Duration::from_millis(PACE_DELAY_MS)
    }
}

/// Network configuration
pub mod network {
    use std::time::Duration;

    /// Request timeout for outbound Telegram API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
