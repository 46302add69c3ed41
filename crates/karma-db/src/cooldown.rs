//! Cooldown gate: per (giver, chat) rate limiting. This is a soft gate —
//! two requests racing past `may_act` before either records its action is
//! tolerated; the ledger's uniqueness constraint is the hard boundary.

use anyhow::Result;
use rusqlite::params;

use crate::models::CooldownRow;
use crate::{Database, OptionalExt};

const MS_PER_MINUTE: i64 = 60 * 1000;

impl Database {
    pub fn cooldown_for(&self, giver_id: i64, chat_id: i64) -> Result<Option<CooldownRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT giver_id, chat_id, last_used_ms
                 FROM reputation_cooldowns
                 WHERE giver_id = ?1 AND chat_id = ?2",
            )?;

            stmt.query_row([giver_id, chat_id], |row| {
                Ok(CooldownRow {
                    giver_id: row.get(0)?,
                    chat_id: row.get(1)?,
                    last_used_ms: row.get(2)?,
                })
            })
            .optional()
        })
    }

    pub fn touch_cooldown(&self, giver_id: i64, chat_id: i64, now_ms: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reputation_cooldowns (giver_id, chat_id, last_used_ms)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(giver_id, chat_id) DO UPDATE SET last_used_ms = excluded.last_used_ms",
                params![giver_id, chat_id, now_ms],
            )?;
            Ok(())
        })
    }
}

/// True when the giver may act: no prior action in the chat, or the window
/// has elapsed.
pub fn may_act(record: Option<&CooldownRow>, cooldown_minutes: i64, now_ms: i64) -> bool {
    match record {
        None => true,
        Some(rec) => now_ms >= rec.last_used_ms + cooldown_minutes * MS_PER_MINUTE,
    }
}

/// Minutes left in the window, rounded up, never negative.
pub fn remaining_minutes(record: &CooldownRow, cooldown_minutes: i64, now_ms: i64) -> i64 {
    let window_end = record.last_used_ms + cooldown_minutes * MS_PER_MINUTE;
    let left = window_end - now_ms;
    if left <= 0 {
        0
    } else {
        (left + MS_PER_MINUTE - 1) / MS_PER_MINUTE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(last_used_ms: i64) -> CooldownRow {
        CooldownRow {
            giver_id: 1,
            chat_id: 1,
            last_used_ms,
        }
    }

    #[test]
    fn no_record_always_passes() {
        assert!(may_act(None, 60, 0));
    }

    #[test]
    fn window_blocks_until_exact_boundary() {
        let r = rec(1_000_000);
        assert!(!may_act(Some(&r), 5, 1_000_000));
        assert!(!may_act(Some(&r), 5, 1_000_000 + 5 * 60_000 - 1));
        assert!(may_act(Some(&r), 5, 1_000_000 + 5 * 60_000));
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let r = rec(1_000_000);
        assert!(may_act(Some(&r), 0, 1_000_000));
    }

    #[test]
    fn remaining_rounds_up_and_clamps() {
        let r = rec(0);
        // 1 ms into a 5 minute window: 4 min 59.999 s left, rounds up to 5
        assert_eq!(remaining_minutes(&r, 5, 1), 5);
        // one ms short of the end rounds up to 1
        assert_eq!(remaining_minutes(&r, 5, 5 * 60_000 - 1), 1);
        // at and past the end it clamps to 0
        assert_eq!(remaining_minutes(&r, 5, 5 * 60_000), 0);
        assert_eq!(remaining_minutes(&r, 5, 10 * 60_000), 0);
    }

    #[test]
    fn touch_upserts_last_used() {
        let db = crate::Database::open_in_memory().unwrap();
        db.ensure_user(&karma_types::models::UserRef::bare(1)).unwrap();
        db.ensure_chat(-1, None, None, 0).unwrap();

        db.touch_cooldown(1, 1, 111).unwrap();
        db.touch_cooldown(1, 1, 222).unwrap();

        let rec = db.cooldown_for(1, 1).unwrap().unwrap();
        assert_eq!(rec.last_used_ms, 222);
    }
}
