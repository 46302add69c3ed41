//! Reputation service: orchestrates the identity registry, cooldown gate
//! and ledger into the four operations the bot transport calls. One
//! instance is constructed at process start and shared; it holds no state
//! beyond the storage handle.

pub mod config;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use karma_db::Database;
use karma_db::cooldown;
use karma_db::ledger::RecordOutcome;
use karma_db::models::ReceivedChangeRow;
use karma_types::ReputationError;
use karma_types::models::{
    ChangeOutcome, ChangeRequest, ReceivedChange, ReputationStats, TopUser, UserReputation,
};

pub use config::ServiceConfig;

/// How many received changes `get_user_reputation` returns.
const RECENT_CHANGES_SHOWN: i64 = 5;

#[derive(Clone)]
pub struct ReputationService {
    db: Arc<Database>,
    config: ServiceConfig,
}

impl ReputationService {
    pub fn new(db: Arc<Database>, config: ServiceConfig) -> Self {
        Self { db, config }
    }

    /// The single mutating entry point. Checks run in a fixed order:
    /// self-target, feature toggle, cooldown, then the transactional ledger
    /// append. Cooldown recording after the commit is best-effort.
    pub fn change_reputation(
        &self,
        req: &ChangeRequest,
    ) -> Result<ChangeOutcome, ReputationError> {
        if req.giver.external_id == req.receiver.external_id {
            return Err(ReputationError::SelfTarget);
        }

        let giver = self.db.ensure_user(&req.giver)?;
        let receiver = self.db.ensure_user(&req.receiver)?;
        let chat = self.db.ensure_chat(
            req.chat_external_id,
            None,
            None,
            self.config.default_cooldown_minutes,
        )?;

        if !chat.reputation_enabled {
            return Err(ReputationError::FeatureDisabled);
        }

        let now_ms = Utc::now().timestamp_millis();
        let record = self.db.cooldown_for(giver.id, chat.id)?;
        if !cooldown::may_act(record.as_ref(), chat.cooldown_minutes, now_ms) {
            let remaining_minutes = record
                .map(|rec| cooldown::remaining_minutes(&rec, chat.cooldown_minutes, now_ms))
                .unwrap_or(0);
            return Err(ReputationError::Cooldown { remaining_minutes });
        }

        let outcome =
            self.db
                .record_change(giver.id, receiver.id, req.value, req.reason.as_deref())?;
        let new_reputation = match outcome {
            RecordOutcome::Duplicate => return Err(ReputationError::AlreadyRated),
            RecordOutcome::Applied { new_reputation, .. } => new_reputation,
        };

        // The ledger entry is committed; a cooldown bookkeeping failure must
        // not undo it.
        if let Err(err) = self.db.touch_cooldown(giver.id, chat.id, now_ms) {
            warn!(
                "Cooldown bookkeeping failed for giver {} in chat {}: {:#}",
                giver.id, chat.id, err
            );
        }

        let direction = if req.value > 0 { "increased" } else { "decreased" };
        let message = format!(
            "Reputation {} by {}. Current reputation: {}",
            direction,
            req.value.abs(),
            new_reputation
        );

        Ok(ChangeOutcome {
            new_reputation,
            message,
        })
    }

    pub fn get_user_reputation(
        &self,
        external_id: i64,
    ) -> Result<UserReputation, ReputationError> {
        let user = self
            .db
            .find_user_by_external_id(external_id)?
            .ok_or(ReputationError::NotFound)?;

        let recent_changes = self
            .db
            .recent_changes_to(user.id, RECENT_CHANGES_SHOWN)?
            .into_iter()
            .map(received_change_from_row)
            .collect();

        Ok(UserReputation {
            external_id: user.external_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            reputation: user.reputation,
            recent_changes,
        })
    }

    pub fn get_top_users(&self, limit: i64) -> Result<Vec<TopUser>, ReputationError> {
        let rows = self.db.top_users(limit)?;
        Ok(rows
            .into_iter()
            .map(|u| TopUser {
                external_id: u.external_id,
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
                reputation: u.reputation,
            })
            .collect())
    }

    pub fn get_stats(&self) -> Result<ReputationStats, ReputationError> {
        let stats = self.db.stats()?;
        Ok(ReputationStats {
            total_users: stats.total_users,
            total_changes: stats.total_changes,
            positive_changes: stats.positive_changes,
            negative_changes: stats.negative_changes,
        })
    }
}

fn received_change_from_row(row: ReceivedChangeRow) -> ReceivedChange {
    ReceivedChange {
        value: row.value,
        reason: row.reason,
        created_at: parse_sqlite_timestamp(&row.created_at),
        giver_username: row.giver_username,
        giver_first_name: row.giver_first_name,
    }
}

fn parse_sqlite_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without
            // timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}': {}", raw, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::parse_sqlite_timestamp;

    #[test]
    fn parses_sqlite_datetime_format() {
        let ts = parse_sqlite_timestamp("2026-08-26 10:30:00");
        assert_eq!(ts.to_rfc3339(), "2026-08-26T10:30:00+00:00");
    }
}
