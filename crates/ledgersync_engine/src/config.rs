//! Configuration for the sync engine.

use ledgersync_protocol::UserId;
use rand::Rng;
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// User whose ledger is synced.
    pub user_id: UserId,
    /// Remote store base URL (e.g. `http://localhost:8080/api`).
    pub server_url: String,
    /// Opaque session token sent as a bearer credential.
    pub auth_token: Option<String>,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Request timeout.
    pub timeout: Duration,
    /// Drop updates whose persisted fields already match the remote row.
    pub skip_unchanged: bool,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(user_id: UserId, server_url: impl Into<String>) -> Self {
        Self {
            user_id,
            server_url: server_url.into(),
            auth_token: None,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
            skip_unchanged: false,
        }
    }

    /// Sets the session token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables field-level dirty tracking for updates.
    pub fn with_skip_unchanged(mut self, skip: bool) -> Self {
        self.skip_unchanged = skip;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(UserId::new(0), "")
    }
}

/// Backoff schedule for [`SyncEngine::sync_with_retry`](crate::SyncEngine::sync_with_retry).
///
/// Attempt `n` (counting retries from 1) waits
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`, plus up to a
/// quarter of that when jitter is on.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts allowed in total, the first one included.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: f64,
    /// Randomize waits so clients do not retry in lockstep.
    pub jitter: bool,
}

impl RetryConfig {
    /// Allows `max_attempts` attempts with the default schedule
    /// (250ms doubling up to 30s, jittered).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }

    /// Single attempt, never waits.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on a single wait.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Turns jitter on or off.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns true if another attempt may follow attempt number `made`.
    pub fn allows_another(&self, made: u32) -> bool {
        made < self.max_attempts.max(1)
    }

    /// Wait before retry number `retry`; zero for the first attempt.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let Some(exponent) = retry.checked_sub(1) else {
            return Duration::ZERO;
        };
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()));

        if self.jitter && !capped.is_zero() {
            capped + capped.mul_f64(rand::thread_rng().gen_range(0.0..0.25))
        } else {
            capped
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new(UserId::new(7), "https://ledger.example.com/api")
            .with_auth_token("session-token")
            .with_skip_unchanged(true)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.user_id, UserId::new(7));
        assert_eq!(config.server_url, "https://ledger.example.com/api");
        assert_eq!(config.auth_token.as_deref(), Some("session-token"));
        assert!(config.skip_unchanged);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn single_attempt_never_waits() {
        let config = RetryConfig::no_retry();
        assert!(config.allows_another(0));
        assert!(!config.allows_another(1));
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn waits_grow_geometrically() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(3.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
        assert!(config.allows_another(4));
        assert!(!config.allows_another(5));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let config = RetryConfig::new(5).with_initial_delay(Duration::from_millis(200));
        for _ in 0..50 {
            let delay = config.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(250));
        }
    }

    #[test]
    fn waits_are_capped() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }
}
