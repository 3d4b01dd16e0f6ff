use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// A bot token registered through the maker bot.
///
/// Root record: subscribers and channel configs are owned by it and must not
/// outlive it.
#[derive(Debug, Clone)]
pub struct RegisteredBot {
    /// Bot API token; primary key, globally unique
    pub token: String,
    /// Bot username as reported by getMe (without @)
    pub username: String,
    /// Telegram user id of the maker-bot user who registered the token
    pub creator_id: i64,
    /// Creator's username at registration time, display-only
    pub creator_username: Option<String>,
    /// Unix seconds
    pub created_at: i64,
}

/// Conversational state of one subscriber of one created bot.
///
/// One current state per subscriber: the two awaiting states are mutually
/// exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AdminPanelOpen,
    AwaitingBroadcastContent,
    AwaitingChannelUrl,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AdminPanelOpen => "panel_open",
            Self::AwaitingBroadcastContent => "awaiting_broadcast",
            Self::AwaitingChannelUrl => "awaiting_channel_url",
        }
    }

    /// Unknown values decode as `Idle` so a schema-era mismatch degrades to
    /// ordinary-user behavior instead of a stuck admin state.
    pub fn parse(s: &str) -> Self {
        match s {
            "panel_open" => Self::AdminPanelOpen,
            "awaiting_broadcast" => Self::AwaitingBroadcastContent,
            "awaiting_channel_url" => Self::AwaitingChannelUrl,
            _ => Self::Idle,
        }
    }
}

/// An end user who has interacted with a specific created bot.
///
/// Composite key `(bot_token, user_id)`. Created lazily on first contact,
/// deleted only en masse when the owning bot is deleted.
#[derive(Debug, Clone)]
pub struct BotSubscriber {
    pub bot_token: String,
    pub user_id: i64,
    pub has_joined: bool,
    pub state: ConversationState,
    /// Message id of the last admin-panel message sent to this chat
    pub panel_message_id: Option<i32>,
    /// Unix seconds of the last inbound event from this user
    pub last_interaction_at: i64,
}

/// Maker-side conversational step for a maker-bot user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakerStep {
    None,
    CreateBot,
    DeleteBot,
}

impl MakerStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CreateBot => "create_bot",
            Self::DeleteBot => "delete_bot",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "create_bot" => Self::CreateBot,
            "delete_bot" => Self::DeleteBot,
            _ => Self::None,
        }
    }
}

/// Owner admin-panel state on the maker side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakerAdminState {
    None,
    AdminPanel,
    AwaitingBroadcastUser,
    AwaitingBroadcastSub,
    AwaitingBlock,
}

impl MakerAdminState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::AdminPanel => "admin_panel",
            Self::AwaitingBroadcastUser => "awaiting_broadcast_user",
            Self::AwaitingBroadcastSub => "awaiting_broadcast_sub",
            Self::AwaitingBlock => "awaiting_block",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin_panel" => Self::AdminPanel,
            "awaiting_broadcast_user" => Self::AwaitingBroadcastUser,
            "awaiting_broadcast_sub" => Self::AwaitingBroadcastSub,
            "awaiting_block" => Self::AwaitingBlock,
            _ => Self::None,
        }
    }
}

/// A user talking to the maker bot itself.
#[derive(Debug, Clone)]
pub struct MakerUser {
    pub user_id: i64,
    pub step: MakerStep,
    pub admin_state: MakerAdminState,
    pub is_blocked: bool,
}

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let conn = pool.get()?;
    init_schema(&conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create all tables if they do not exist yet. Idempotent.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS bots (
            token            TEXT PRIMARY KEY,
            username         TEXT NOT NULL,
            creator_id       INTEGER NOT NULL,
            creator_username TEXT,
            created_at       INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS subscribers (
            bot_token           TEXT NOT NULL,
            user_id             INTEGER NOT NULL,
            has_joined          INTEGER NOT NULL DEFAULT 0,
            state               TEXT NOT NULL DEFAULT 'idle',
            panel_message_id    INTEGER,
            last_interaction_at INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (bot_token, user_id)
        );
        CREATE TABLE IF NOT EXISTS channel_configs (
            bot_token TEXT PRIMARY KEY,
            url       TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS maker_users (
            user_id     INTEGER PRIMARY KEY,
            step        TEXT NOT NULL DEFAULT 'none',
            admin_state TEXT NOT NULL DEFAULT 'none',
            is_blocked  INTEGER NOT NULL DEFAULT 0
        );",
    )
}

// ---------------------------------------------------------------------------
// RegisteredBot
// ---------------------------------------------------------------------------

/// Insert a newly registered bot.
///
/// The caller checks `bot_exists` first for the user-facing duplicate error;
/// the PRIMARY KEY constraint still backstops concurrent registration of the
/// same token.
pub fn insert_bot(conn: &Connection, bot: &RegisteredBot) -> Result<()> {
    conn.execute(
        "INSERT INTO bots (token, username, creator_id, creator_username, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bot.token,
            bot.username,
            bot.creator_id,
            bot.creator_username,
            bot.created_at
        ],
    )?;
    Ok(())
}

fn bot_from_row(row: &rusqlite::Row<'_>) -> Result<RegisteredBot> {
    Ok(RegisteredBot {
        token: row.get(0)?,
        username: row.get(1)?,
        creator_id: row.get(2)?,
        creator_username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Look up a registered bot by token.
pub fn get_bot(conn: &Connection, token: &str) -> Result<Option<RegisteredBot>> {
    conn.query_row(
        "SELECT token, username, creator_id, creator_username, created_at
         FROM bots WHERE token = ?1",
        params![token],
        bot_from_row,
    )
    .optional()
}

/// Platform-wide token uniqueness check.
pub fn bot_exists(conn: &Connection, token: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bots WHERE token = ?1",
        params![token],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// All bots registered by one maker-bot user, oldest first.
pub fn bots_by_creator(conn: &Connection, creator_id: i64) -> Result<Vec<RegisteredBot>> {
    let mut stmt = conn.prepare(
        "SELECT token, username, creator_id, creator_username, created_at
         FROM bots WHERE creator_id = ?1 ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![creator_id], bot_from_row)?;
    rows.collect()
}

/// Total number of registered bots.
pub fn count_bots(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM bots", [], |row| row.get(0))
}

/// Top bots ranked by subscriber count (all subscribers, joined or not),
/// for the owner statistics screen.
pub fn top_bots_by_subscribers(
    conn: &Connection,
    limit: i64,
) -> Result<Vec<(RegisteredBot, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT b.token, b.username, b.creator_id, b.creator_username, b.created_at,
                (SELECT COUNT(*) FROM subscribers s WHERE s.bot_token = b.token) AS subs
         FROM bots b ORDER BY subs DESC, b.created_at LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok((bot_from_row(row)?, row.get::<_, i64>(5)?))
    })?;
    rows.collect()
}

/// Delete a bot and everything it owns: subscriber rows and channel config.
///
/// Returns `false` if no bot with that token existed (nothing is deleted in
/// that case).
pub fn delete_bot_cascade(conn: &Connection, token: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM bots WHERE token = ?1", params![token])?;
    if deleted == 0 {
        return Ok(false);
    }
    conn.execute(
        "DELETE FROM subscribers WHERE bot_token = ?1",
        params![token],
    )?;
    conn.execute(
        "DELETE FROM channel_configs WHERE bot_token = ?1",
        params![token],
    )?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// BotSubscriber
// ---------------------------------------------------------------------------

fn subscriber_from_row(row: &rusqlite::Row<'_>) -> Result<BotSubscriber> {
    let state: String = row.get(3)?;
    Ok(BotSubscriber {
        bot_token: row.get(0)?,
        user_id: row.get(1)?,
        has_joined: row.get::<_, i64>(2)? != 0,
        state: ConversationState::parse(&state),
        panel_message_id: row.get(4)?,
        last_interaction_at: row.get(5)?,
    })
}

/// Fetch a subscriber row, creating it on first contact.
///
/// Uses an atomic upsert so concurrent first contacts (retried webhook
/// deliveries) cannot race into a duplicate; the upsert also touches
/// `last_interaction_at` on every call.
pub fn ensure_subscriber(
    conn: &Connection,
    bot_token: &str,
    user_id: i64,
    now: i64,
) -> Result<BotSubscriber> {
    conn.execute(
        "INSERT INTO subscribers (bot_token, user_id, last_interaction_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(bot_token, user_id) DO UPDATE SET last_interaction_at = ?3",
        params![bot_token, user_id, now],
    )?;
    conn.query_row(
        "SELECT bot_token, user_id, has_joined, state, panel_message_id, last_interaction_at
         FROM subscribers WHERE bot_token = ?1 AND user_id = ?2",
        params![bot_token, user_id],
        subscriber_from_row,
    )
}

/// Fetch a subscriber row without creating it.
pub fn get_subscriber(
    conn: &Connection,
    bot_token: &str,
    user_id: i64,
) -> Result<Option<BotSubscriber>> {
    conn.query_row(
        "SELECT bot_token, user_id, has_joined, state, panel_message_id, last_interaction_at
         FROM subscribers WHERE bot_token = ?1 AND user_id = ?2",
        params![bot_token, user_id],
        subscriber_from_row,
    )
    .optional()
}

/// Mark a subscriber as having passed the join-gate. Idempotent: duplicate
/// or out-of-order "joined" callbacks all land on `has_joined = 1`.
pub fn set_subscriber_joined(conn: &Connection, bot_token: &str, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE subscribers SET has_joined = 1 WHERE bot_token = ?1 AND user_id = ?2",
        params![bot_token, user_id],
    )?;
    Ok(())
}

/// Overwrite a subscriber's conversation state. Last write wins.
pub fn set_subscriber_state(
    conn: &Connection,
    bot_token: &str,
    user_id: i64,
    state: ConversationState,
) -> Result<()> {
    conn.execute(
        "UPDATE subscribers SET state = ?3 WHERE bot_token = ?1 AND user_id = ?2",
        params![bot_token, user_id, state.as_str()],
    )?;
    Ok(())
}

/// Track (or clear) the admin-panel message id for a subscriber's chat.
pub fn set_panel_message(
    conn: &Connection,
    bot_token: &str,
    user_id: i64,
    message_id: Option<i32>,
) -> Result<()> {
    conn.execute(
        "UPDATE subscribers SET panel_message_id = ?3 WHERE bot_token = ?1 AND user_id = ?2",
        params![bot_token, user_id, message_id],
    )?;
    Ok(())
}

/// Number of joined subscribers of one bot.
pub fn joined_count(conn: &Connection, bot_token: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM subscribers WHERE bot_token = ?1 AND has_joined = 1",
        params![bot_token],
        |row| row.get(0),
    )
}

/// User ids of all joined subscribers of one bot, in stable order.
pub fn joined_subscriber_ids(conn: &Connection, bot_token: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM subscribers WHERE bot_token = ?1 AND has_joined = 1 ORDER BY user_id",
    )?;
    let rows = stmt.query_map(params![bot_token], |row| row.get(0))?;
    rows.collect()
}

/// Distinct user ids that joined any created bot (owner "Broadcast Sub").
pub fn distinct_joined_user_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT DISTINCT user_id FROM subscribers WHERE has_joined = 1 ORDER BY user_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Channel URL configured for a bot, if any. Absence is legal and resolves
/// to the platform default at the call site.
pub fn channel_url(conn: &Connection, bot_token: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT url FROM channel_configs WHERE bot_token = ?1",
        params![bot_token],
        |row| row.get(0),
    )
    .optional()
}

/// Create or overwrite the channel URL for a bot.
pub fn set_channel_url(conn: &Connection, bot_token: &str, url: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO channel_configs (bot_token, url) VALUES (?1, ?2)
         ON CONFLICT(bot_token) DO UPDATE SET url = ?2",
        params![bot_token, url],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// MakerUser
// ---------------------------------------------------------------------------

fn maker_user_from_row(row: &rusqlite::Row<'_>) -> Result<MakerUser> {
    let step: String = row.get(1)?;
    let admin_state: String = row.get(2)?;
    Ok(MakerUser {
        user_id: row.get(0)?,
        step: MakerStep::parse(&step),
        admin_state: MakerAdminState::parse(&admin_state),
        is_blocked: row.get::<_, i64>(3)? != 0,
    })
}

/// Fetch a maker-bot user, creating the row on first contact.
pub fn ensure_maker_user(conn: &Connection, user_id: i64) -> Result<MakerUser> {
    conn.execute(
        "INSERT INTO maker_users (user_id) VALUES (?1)
         ON CONFLICT(user_id) DO NOTHING",
        params![user_id],
    )?;
    conn.query_row(
        "SELECT user_id, step, admin_state, is_blocked FROM maker_users WHERE user_id = ?1",
        params![user_id],
        maker_user_from_row,
    )
}

/// Fetch a maker-bot user without creating it.
pub fn get_maker_user(conn: &Connection, user_id: i64) -> Result<Option<MakerUser>> {
    conn.query_row(
        "SELECT user_id, step, admin_state, is_blocked FROM maker_users WHERE user_id = ?1",
        params![user_id],
        maker_user_from_row,
    )
    .optional()
}

/// Reset a maker user to the neutral state (what `/start` does).
pub fn reset_maker_user(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO maker_users (user_id, step, admin_state, is_blocked)
         VALUES (?1, 'none', 'none', 0)
         ON CONFLICT(user_id) DO UPDATE SET step = 'none', admin_state = 'none', is_blocked = 0",
        params![user_id],
    )?;
    Ok(())
}

pub fn set_maker_step(conn: &Connection, user_id: i64, step: MakerStep) -> Result<()> {
    conn.execute(
        "UPDATE maker_users SET step = ?2 WHERE user_id = ?1",
        params![user_id, step.as_str()],
    )?;
    Ok(())
}

pub fn set_maker_admin_state(
    conn: &Connection,
    user_id: i64,
    state: MakerAdminState,
) -> Result<()> {
    conn.execute(
        "UPDATE maker_users SET admin_state = ?2 WHERE user_id = ?1",
        params![user_id, state.as_str()],
    )?;
    Ok(())
}

pub fn set_maker_blocked(conn: &Connection, user_id: i64, blocked: bool) -> Result<()> {
    conn.execute(
        "UPDATE maker_users SET is_blocked = ?2 WHERE user_id = ?1",
        params![user_id, blocked as i64],
    )?;
    Ok(())
}

/// Unblocked maker users, the "Broadcast User" audience.
pub fn unblocked_maker_user_ids(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM maker_users WHERE is_blocked = 0 ORDER BY user_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Count of unblocked maker users.
pub fn count_maker_users(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM maker_users WHERE is_blocked = 0",
        [],
        |row| row.get(0),
    )
}

/// Owner `/clear`: wipe every record kind. Destructive and unrecoverable.
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DELETE FROM bots;
         DELETE FROM subscribers;
         DELETE FROM channel_configs;
         DELETE FROM maker_users;",
    )
}
