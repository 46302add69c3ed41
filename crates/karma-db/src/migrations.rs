use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id INTEGER NOT NULL UNIQUE,
            username    TEXT,
            first_name  TEXT,
            last_name   TEXT,
            reputation  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS chats (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id        INTEGER NOT NULL UNIQUE,
            title              TEXT,
            kind               TEXT,
            reputation_enabled INTEGER NOT NULL DEFAULT 1,
            cooldown_minutes   INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- The ledger is append-only. UNIQUE(giver_id, receiver_id) is the
        -- correctness boundary: a giver rates a receiver at most once ever,
        -- even when two requests race.
        CREATE TABLE IF NOT EXISTS reputation_changes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            giver_id    INTEGER NOT NULL REFERENCES users(id),
            receiver_id INTEGER NOT NULL REFERENCES users(id),
            value       INTEGER NOT NULL,
            reason      TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(giver_id, receiver_id)
        );

        CREATE INDEX IF NOT EXISTS idx_changes_receiver
            ON reputation_changes(receiver_id, created_at);

        CREATE TABLE IF NOT EXISTS reputation_cooldowns (
            giver_id     INTEGER NOT NULL REFERENCES users(id),
            chat_id      INTEGER NOT NULL REFERENCES chats(id),
            last_used_ms INTEGER NOT NULL,
            UNIQUE(giver_id, chat_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
