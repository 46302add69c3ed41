//! The reputation ledger: append-only giver→receiver change records plus
//! the receiver's aggregate, kept consistent in one transaction.

use anyhow::Result;
use rusqlite::params;

use crate::models::{ReceivedChangeRow, StatsRow};
use crate::{Database, OptionalExt};

/// Outcome of an attempted ledger append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Applied { change_id: i64, new_reputation: i64 },
    /// The (giver, receiver) pair already has a ledger row; nothing was
    /// written.
    Duplicate,
}

impl Database {
    /// Append a change and apply it to the receiver's aggregate, atomically.
    ///
    /// The insert relies on the UNIQUE(giver_id, receiver_id) constraint to
    /// reject repeats, so of two racing calls for the same pair exactly one
    /// commits. The aggregate update is relative (`reputation + ?`), never a
    /// read-modify-write round trip.
    pub fn record_change(
        &self,
        giver_id: i64,
        receiver_id: i64,
        value: i64,
        reason: Option<&str>,
    ) -> Result<RecordOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let inserted = tx.execute(
                "INSERT INTO reputation_changes (giver_id, receiver_id, value, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                params![giver_id, receiver_id, value, reason],
            );
            match inserted {
                Ok(_) => {}
                // Only a UNIQUE violation means "pair already rated"; FK and
                // NOT NULL violations stay storage errors.
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    // tx drops here and rolls back; nothing was written
                    return Ok(RecordOutcome::Duplicate);
                }
                Err(e) => return Err(e.into()),
            }
            let change_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE users SET reputation = reputation + ?1 WHERE id = ?2",
                params![value, receiver_id],
            )?;
            let new_reputation: i64 = tx.query_row(
                "SELECT reputation FROM users WHERE id = ?1",
                [receiver_id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(RecordOutcome::Applied {
                change_id,
                new_reputation,
            })
        })
    }

    /// The receiver's current total. None for unknown users.
    pub fn aggregate_of(&self, user_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT reputation FROM users WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Newest-first changes received by a user, with the giver's display
    /// fields joined in for rendering.
    pub fn recent_changes_to(&self, receiver_id: i64, limit: i64) -> Result<Vec<ReceivedChangeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.value, c.reason, c.created_at, g.username, g.first_name
                 FROM reputation_changes c
                 LEFT JOIN users g ON c.giver_id = g.id
                 WHERE c.receiver_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![receiver_id, limit], |row| {
                    Ok(ReceivedChangeRow {
                        value: row.get(0)?,
                        reason: row.get(1)?,
                        created_at: row.get(2)?,
                        giver_username: row.get(3)?,
                        giver_first_name: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn stats(&self) -> Result<StatsRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM reputation_changes),
                    (SELECT COUNT(*) FROM reputation_changes WHERE value > 0),
                    (SELECT COUNT(*) FROM reputation_changes WHERE value < 0)",
                [],
                |row| {
                    Ok(StatsRow {
                        total_users: row.get(0)?,
                        total_changes: row.get(1)?,
                        positive_changes: row.get(2)?,
                        negative_changes: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::RecordOutcome;
    use crate::Database;
    use karma_types::models::UserRef;

    fn seeded_pair(db: &Database) -> (i64, i64) {
        let giver = db.ensure_user(&UserRef::bare(10)).unwrap();
        let receiver = db.ensure_user(&UserRef::bare(20)).unwrap();
        (giver.id, receiver.id)
    }

    #[test]
    fn applies_change_and_aggregate_together() {
        let db = Database::open_in_memory().unwrap();
        let (giver, receiver) = seeded_pair(&db);

        let outcome = db.record_change(giver, receiver, -1, Some("spam")).unwrap();
        match outcome {
            RecordOutcome::Applied { new_reputation, .. } => assert_eq!(new_reputation, -1),
            RecordOutcome::Duplicate => panic!("first change must apply"),
        }
        assert_eq!(db.aggregate_of(receiver).unwrap(), Some(-1));
    }

    #[test]
    fn duplicate_pair_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (giver, receiver) = seeded_pair(&db);

        db.record_change(giver, receiver, 1, None).unwrap();
        let second = db.record_change(giver, receiver, 1, None).unwrap();

        assert_eq!(second, RecordOutcome::Duplicate);
        assert_eq!(db.aggregate_of(receiver).unwrap(), Some(1));
        assert_eq!(db.stats().unwrap().total_changes, 1);
    }

    #[test]
    fn unknown_receiver_is_an_error_not_a_duplicate() {
        let db = Database::open_in_memory().unwrap();
        let giver = db.ensure_user(&UserRef::bare(10)).unwrap();

        // FK violation: must surface as a storage error, never as Duplicate.
        assert!(db.record_change(giver.id, 9999, 1, None).is_err());
    }

    #[test]
    fn opposite_direction_is_a_distinct_pair() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = seeded_pair(&db);

        db.record_change(a, b, 1, None).unwrap();
        let back = db.record_change(b, a, 1, None).unwrap();

        assert!(matches!(back, RecordOutcome::Applied { .. }));
    }

    #[test]
    fn aggregate_sums_values_from_many_givers() {
        let db = Database::open_in_memory().unwrap();
        let receiver = db.ensure_user(&UserRef::bare(1)).unwrap();

        for (ext, value) in [(2, 1), (3, -1), (4, 5)] {
            let giver = db.ensure_user(&UserRef::bare(ext)).unwrap();
            db.record_change(giver.id, receiver.id, value, None).unwrap();
        }

        assert_eq!(db.aggregate_of(receiver.id).unwrap(), Some(5));
    }

    #[test]
    fn recent_changes_come_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let receiver = db.ensure_user(&UserRef::bare(1)).unwrap();

        for (ext, value) in [(2, 1), (3, -1), (4, 1)] {
            let giver = db.ensure_user(&UserRef::bare(ext)).unwrap();
            db.record_change(giver.id, receiver.id, value, None).unwrap();
        }

        let recent = db.recent_changes_to(receiver.id, 2).unwrap();
        assert_eq!(recent.len(), 2);
        // same-second inserts fall back to id order, so the last insert wins
        assert_eq!(recent[0].value, 1);
        assert_eq!(recent[1].value, -1);
    }

    #[test]
    fn stats_split_by_sign() {
        let db = Database::open_in_memory().unwrap();
        let receiver = db.ensure_user(&UserRef::bare(1)).unwrap();

        for (ext, value) in [(2, 1), (3, 2), (4, -1)] {
            let giver = db.ensure_user(&UserRef::bare(ext)).unwrap();
            db.record_change(giver.id, receiver.id, value, None).unwrap();
        }

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.total_changes, 3);
        assert_eq!(stats.positive_changes, 2);
        assert_eq!(stats.negative_changes, 1);
    }
}
