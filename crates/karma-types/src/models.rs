use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user as seen by the chat platform. `external_id` is the stable
/// identity; the display fields are whatever the platform reported at the
/// time of the sighting and may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserRef {
    pub fn bare(external_id: i64) -> Self {
        Self {
            external_id,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

/// One already-parsed "+rep"/"-rep" intent from the bot transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub giver: UserRef,
    pub receiver: UserRef,
    pub chat_external_id: i64,
    /// Signed delta. Callers pass ±1 in practice but any magnitude is
    /// accepted.
    pub value: i64,
    pub reason: Option<String>,
}

/// Result of a successful reputation change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub new_reputation: i64,
    /// Human-facing delta description, ready for the transport to render.
    pub message: String,
}

/// One received ledger entry, newest-first in query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedChange {
    pub value: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub giver_username: Option<String>,
    pub giver_first_name: Option<String>,
}

/// A user's aggregate score plus their most recent received changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReputation {
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reputation: i64,
    pub recent_changes: Vec<ReceivedChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopUser {
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reputation: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReputationStats {
    pub total_users: i64,
    pub total_changes: i64,
    pub positive_changes: i64,
    pub negative_changes: i64,
}
