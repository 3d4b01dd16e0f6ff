//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod pacer;
pub mod web_server;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use pacer::Pacer;
