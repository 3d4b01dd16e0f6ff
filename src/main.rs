use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use botfactory::core::{config, init_logger, web_server};
use botfactory::storage::create_pool;
use botfactory::telegram::TeloxideGateway;
use botfactory::HandlerDeps;

/// Main entry point for the bot factory webhook server
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration,
/// database) or if the HTTP server stops unexpectedly.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Missing required configuration is fatal: refuse to serve webhooks
    // we cannot answer.
    config::validate()?;

    let pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    log::info!("Database ready at {}", *config::DATABASE_PATH);

    let gateway = Arc::new(TeloxideGateway::new()?);
    let deps = HandlerDeps::new(pool, gateway);

    web_server::start_web_server(*config::PORT, deps).await
}
