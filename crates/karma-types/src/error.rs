use thiserror::Error;

/// Failure modes of the reputation service. All are terminal for the
/// current request; only `Storage` is sensible to retry.
#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("you cannot change your own reputation")]
    SelfTarget,

    #[error("reputation is disabled in this chat")]
    FeatureDisabled,

    /// Giver is still inside the per-chat cooldown window.
    #[error("wait {remaining_minutes} more minute(s) before changing reputation again")]
    Cooldown { remaining_minutes: i64 },

    #[error("you have already changed this user's reputation")]
    AlreadyRated,

    #[error("user not found")]
    NotFound,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for ReputationError {
    fn from(err: anyhow::Error) -> Self {
        ReputationError::Storage(format!("{err:#}"))
    }
}

impl ReputationError {
    /// Machine-readable code for transports that key responses off it.
    pub fn code(&self) -> &'static str {
        match self {
            ReputationError::SelfTarget => "SELF_TARGET",
            ReputationError::FeatureDisabled => "FEATURE_DISABLED",
            ReputationError::Cooldown { .. } => "COOLDOWN",
            ReputationError::AlreadyRated => "ALREADY_RATED",
            ReputationError::NotFound => "NOT_FOUND",
            ReputationError::Storage(_) => "STORAGE",
        }
    }
}
