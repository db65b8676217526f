use std::time::Duration;

/// Settings for the dispatch engine. Injected into [`super::Dispatcher`];
/// the engine itself never reads the environment.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Delay before attempt `n + 1` is `backoff_base_ms * n`.
    pub backoff_base_ms: u64,
    /// Response bodies are stored truncated to this many characters.
    pub response_body_limit: usize,
    /// How many times an attempt-log insert is tried before giving up.
    pub log_write_attempts: u32,
    pub user_agent: String,
}

impl DispatcherConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("WEBHOOK_BACKOFF_BASE_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            config.backoff_base_ms = parsed;
        }
        if let Ok(value) = std::env::var("WEBHOOK_RESPONSE_BODY_LIMIT")
            && let Ok(parsed) = value.parse::<usize>()
        {
            config.response_body_limit = parsed;
        }
        if let Ok(value) = std::env::var("WEBHOOK_LOG_WRITE_ATTEMPTS")
            && let Ok(parsed) = value.parse::<u32>()
        {
            config.log_write_attempts = parsed.max(1);
        }
        if let Ok(value) = std::env::var("WEBHOOK_USER_AGENT")
            && !value.trim().is_empty()
        {
            config.user_agent = value;
        }

        config
    }

    /// Backoff slept after a failed `attempt` (1-based) before the next one.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1_000,
            response_body_limit: 1_000,
            log_write_attempts: 2,
            user_agent: concat!("webhook-dispatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
