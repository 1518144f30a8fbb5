// Sync engine configuration
//
// SyncConfig is constructed once at process start and passed into each
// component by injection. Nothing in the engine reads the environment after
// startup and there are no module-scoped singletons.

use std::time::Duration;

/// Retry behavior for retryable provider failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so 4 means up to 3 retries)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based), exponential and
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
        }
    }
}

/// Configuration for the calendar sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Public base URL the provider delivers webhooks to,
    /// e.g. "https://app.fieldline.dev"
    pub webhook_base_url: String,
    /// Requested lifetime for push channels
    pub channel_ttl_hours: i64,
    /// Channels expiring within this window get renewed
    pub renewal_lookahead_hours: i64,
    /// Bounded timeout carried on every provider call
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Load configuration from the environment.
    ///
    /// `WEBHOOK_BASE_URL` is required; everything else has defaults:
    /// `CHANNEL_TTL_HOURS` (168), `RENEWAL_LOOKAHEAD_HOURS` (48),
    /// `PROVIDER_TIMEOUT_SECS` (30), `PROVIDER_RETRY_ATTEMPTS` (4).
    pub fn from_env() -> anyhow::Result<Self> {
        let webhook_base_url = std::env::var("WEBHOOK_BASE_URL")
            .map_err(|_| anyhow::anyhow!("WEBHOOK_BASE_URL environment variable required"))?;

        Ok(Self {
            webhook_base_url,
            channel_ttl_hours: env_i64("CHANNEL_TTL_HOURS", default_channel_ttl_hours()),
            renewal_lookahead_hours: env_i64(
                "RENEWAL_LOOKAHEAD_HOURS",
                default_renewal_lookahead_hours(),
            ),
            request_timeout: Duration::from_secs(env_i64("PROVIDER_TIMEOUT_SECS", 30) as u64),
            retry: RetryPolicy {
                max_attempts: env_i64("PROVIDER_RETRY_ATTEMPTS", 4) as u32,
                ..RetryPolicy::default()
            },
        })
    }

    /// Full URL of the webhook ingestion endpoint
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/webhook/calendar",
            self.webhook_base_url.trim_end_matches('/')
        )
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            webhook_base_url: "http://localhost:9000".to_string(),
            channel_ttl_hours: default_channel_ttl_hours(),
            renewal_lookahead_hours: default_renewal_lookahead_hours(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_channel_ttl_hours() -> i64 {
    168
}

fn default_renewal_lookahead_hours() -> i64 {
    48
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3));
    }

    #[test]
    fn webhook_url_tolerates_trailing_slash() {
        let config = SyncConfig {
            webhook_base_url: "https://app.fieldline.dev/".to_string(),
            ..SyncConfig::default()
        };
        assert_eq!(
            config.webhook_url(),
            "https://app.fieldline.dev/webhook/calendar"
        );
    }
}
