//! SQLite-backed state store
//!
//! Holds every record kind the platform owns: registered bots, per-bot
//! subscribers, channel configs and maker-side users. The running process
//! keeps no authoritative in-memory copy; every request re-reads state.

pub mod db;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
