/// Database row types — these map directly to SQLite rows.
/// Distinct from the karma-types DTOs to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub external_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reputation: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: i64,
    pub external_id: i64,
    pub title: Option<String>,
    pub kind: Option<String>,
    pub reputation_enabled: bool,
    pub cooldown_minutes: i64,
}

/// One received ledger entry joined with the giver's display fields.
#[derive(Debug, Clone)]
pub struct ReceivedChangeRow {
    pub value: i64,
    pub reason: Option<String>,
    pub created_at: String,
    pub giver_username: Option<String>,
    pub giver_first_name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct CooldownRow {
    pub giver_id: i64,
    pub chat_id: i64,
    /// Unix milliseconds of the giver's last successful change in the chat.
    pub last_used_ms: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct StatsRow {
    pub total_users: i64,
    pub total_changes: i64,
    pub positive_changes: i64,
    pub negative_changes: i64,
}
