//! Identity registry: lazy create-or-refresh of users and chats keyed by
//! their platform identity. Rows are never deleted.

use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};

use crate::models::{ChatRow, UserRow};
use crate::{Database, OptionalExt};
use karma_types::models::UserRef;

impl Database {
    /// Look the user up by platform identity; insert on first sight,
    /// otherwise refresh the display fields. A display field absent from
    /// the sighting keeps its stored value.
    pub fn ensure_user(&self, user: &UserRef) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            match query_user_by_external_id(conn, user.external_id)? {
                Some(existing) => {
                    conn.execute(
                        "UPDATE users SET
                            username   = COALESCE(?1, username),
                            first_name = COALESCE(?2, first_name),
                            last_name  = COALESCE(?3, last_name)
                         WHERE id = ?4",
                        params![user.username, user.first_name, user.last_name, existing.id],
                    )?;
                    query_user_by_id(conn, existing.id)?
                        .ok_or_else(|| anyhow!("user {} vanished during refresh", existing.id))
                }
                None => {
                    conn.execute(
                        "INSERT INTO users (external_id, username, first_name, last_name)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![user.external_id, user.username, user.first_name, user.last_name],
                    )?;
                    let id = conn.last_insert_rowid();
                    query_user_by_id(conn, id)?
                        .ok_or_else(|| anyhow!("user {} vanished after insert", id))
                }
            }
        })
    }

    /// Same create-or-refresh semantics for chats. New chats start with
    /// reputation enabled and the caller-supplied cooldown default.
    pub fn ensure_chat(
        &self,
        external_id: i64,
        title: Option<&str>,
        kind: Option<&str>,
        default_cooldown_minutes: i64,
    ) -> Result<ChatRow> {
        self.with_conn_mut(|conn| {
            match query_chat_by_external_id(conn, external_id)? {
                Some(existing) => {
                    conn.execute(
                        "UPDATE chats SET
                            title = COALESCE(?1, title),
                            kind  = COALESCE(?2, kind)
                         WHERE id = ?3",
                        params![title, kind, existing.id],
                    )?;
                    query_chat_by_id(conn, existing.id)?
                        .ok_or_else(|| anyhow!("chat {} vanished during refresh", existing.id))
                }
                None => {
                    conn.execute(
                        "INSERT INTO chats (external_id, title, kind, cooldown_minutes)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![external_id, title, kind, default_cooldown_minutes],
                    )?;
                    let id = conn.last_insert_rowid();
                    query_chat_by_id(conn, id)?
                        .ok_or_else(|| anyhow!("chat {} vanished after insert", id))
                }
            }
        })
    }

    pub fn find_user_by_external_id(&self, external_id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_external_id(conn, external_id))
    }

    /// Highest reputation first; ties keep insertion order.
    pub fn top_users(&self, limit: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, external_id, username, first_name, last_name, reputation, created_at
                 FROM users
                 ORDER BY reputation DESC, id ASC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        external_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        reputation: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_user_by_external_id(conn: &Connection, external_id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_id, username, first_name, last_name, reputation, created_at
         FROM users WHERE external_id = ?1",
    )?;

    stmt.query_row([external_id], user_from_row).optional()
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_id, username, first_name, last_name, reputation, created_at
         FROM users WHERE id = ?1",
    )?;

    stmt.query_row([id], user_from_row).optional()
}

fn query_chat_by_external_id(conn: &Connection, external_id: i64) -> Result<Option<ChatRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_id, title, kind, reputation_enabled, cooldown_minutes
         FROM chats WHERE external_id = ?1",
    )?;

    stmt.query_row([external_id], chat_from_row).optional()
}

fn query_chat_by_id(conn: &Connection, id: i64) -> Result<Option<ChatRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, external_id, title, kind, reputation_enabled, cooldown_minutes
         FROM chats WHERE id = ?1",
    )?;

    stmt.query_row([id], chat_from_row).optional()
}

fn chat_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        id: row.get(0)?,
        external_id: row.get(1)?,
        title: row.get(2)?,
        kind: row.get(3)?,
        reputation_enabled: row.get(4)?,
        cooldown_minutes: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use karma_types::models::UserRef;

    fn named(external_id: i64, username: &str) -> UserRef {
        UserRef {
            external_id,
            username: Some(username.into()),
            first_name: Some("Test".into()),
            last_name: None,
        }
    }

    #[test]
    fn ensure_user_creates_then_refreshes() {
        let db = Database::open_in_memory().unwrap();

        let created = db.ensure_user(&named(100, "alice")).unwrap();
        assert_eq!(created.reputation, 0);
        assert_eq!(created.username.as_deref(), Some("alice"));

        let refreshed = db.ensure_user(&named(100, "alice_renamed")).unwrap();
        assert_eq!(refreshed.id, created.id);
        assert_eq!(refreshed.username.as_deref(), Some("alice_renamed"));
    }

    #[test]
    fn ensure_user_keeps_fields_absent_from_sighting() {
        let db = Database::open_in_memory().unwrap();

        db.ensure_user(&named(100, "alice")).unwrap();
        let resighted = db.ensure_user(&UserRef::bare(100)).unwrap();

        assert_eq!(resighted.username.as_deref(), Some("alice"));
        assert_eq!(resighted.first_name.as_deref(), Some("Test"));
    }

    #[test]
    fn ensure_chat_applies_cooldown_default_only_at_creation() {
        let db = Database::open_in_memory().unwrap();

        let created = db.ensure_chat(-500, Some("lounge"), Some("group"), 15).unwrap();
        assert!(created.reputation_enabled);
        assert_eq!(created.cooldown_minutes, 15);

        // A different default on re-sight must not rewrite the chat policy.
        let resighted = db.ensure_chat(-500, None, None, 99).unwrap();
        assert_eq!(resighted.id, created.id);
        assert_eq!(resighted.cooldown_minutes, 15);
        assert_eq!(resighted.title.as_deref(), Some("lounge"));
    }

    #[test]
    fn top_users_orders_by_reputation_then_insertion() {
        let db = Database::open_in_memory().unwrap();

        for ext in [1, 2, 3] {
            db.ensure_user(&UserRef::bare(ext)).unwrap();
        }
        db.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET reputation = 5 WHERE external_id = 2", [])?;
            conn.execute("UPDATE users SET reputation = 3 WHERE external_id = 1", [])?;
            conn.execute("UPDATE users SET reputation = 3 WHERE external_id = 3", [])?;
            Ok(())
        })
        .unwrap();

        let top = db.top_users(3).unwrap();
        let ids: Vec<i64> = top.iter().map(|u| u.external_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
