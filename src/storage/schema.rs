use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

/// Current schema version.  Increment when adding new migrations.
const SCHEMA_VERSION: u32 = 1;

/// Apply all pending migrations to `conn`.
///
/// Migrations are idempotent — tables are created with `IF NOT EXISTS` and the
/// `meta` table tracks which version has been applied so we only run new ones.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Enable WAL mode for better concurrent read performance.
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    // ------------------------------------------------------------------
    // meta — tracks schema version and arbitrary key/value pairs.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    let current_version = get_schema_version(conn);

    if current_version >= SCHEMA_VERSION {
        debug!(version = current_version, "metadata schema up to date");
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!(version = SCHEMA_VERSION, "metadata schema migrated");
    Ok(())
}

// ---------------------------------------------------------------------------
// v1 — initial tables
// ---------------------------------------------------------------------------

fn migrate_v1(conn: &Connection) -> Result<()> {
    // ------------------------------------------------------------------
    // notes — note rows keyed by the vector point id issued on upsert.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS notes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_name      TEXT,
            title           TEXT,
            content         TEXT    NOT NULL,
            vector_id       TEXT    NOT NULL UNIQUE,
            embedding_model TEXT    NOT NULL,
            created_at      TEXT    NOT NULL
        );",
    )?;

    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_notes_agent ON notes(agent_name);")?;

    // ------------------------------------------------------------------
    // conversations — one row per agent exchange.
    // ------------------------------------------------------------------
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_name     TEXT    NOT NULL,
            user_input     TEXT    NOT NULL,
            agent_response TEXT    NOT NULL,
            vector_id      TEXT    UNIQUE,
            created_at     TEXT    NOT NULL
        );",
    )?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_conversations_agent ON conversations(agent_name);",
    )?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_schema_version(conn: &Connection) -> u32 {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<u32>().unwrap_or(0))
        },
    )
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
        [version.to_string()],
    )?;
    Ok(())
}
