/// Policy applied to chats at creation time. Existing chats keep whatever
/// policy they were created with.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub default_cooldown_minutes: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_cooldown_minutes: 0,
        }
    }
}

impl ServiceConfig {
    /// Read overrides from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let default_cooldown_minutes = std::env::var("KARMA_DEFAULT_COOLDOWN_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            default_cooldown_minutes,
        }
    }
}
