//! Configuration for the sync engine.

use elog_sync_protocol::Url;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a pass does when an entry disappeared on one side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Report the deletions and carry them out only on a pass run with
    /// [`crate::PassOptions::confirm_deletions`] set.
    #[default]
    Confirm,
    /// Carry deletions out immediately.
    Automatic,
    /// Never delete; the deletions stay pending.
    Never,
}

/// Configuration for mirroring one logbook with one peer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Logbook name, used in request paths and the cache file name.
    pub logbook: String,
    /// Base URL of the peer server.
    pub peer_url: Url,
    /// Timeout for each request to the peer.
    pub timeout: Duration,
    /// Deletion propagation policy.
    pub deletion_policy: DeletionPolicy,
    /// Directory holding the mirror cache. Defaults to the logbook's data
    /// directory.
    pub cache_dir: Option<PathBuf>,
    /// Retry configuration for fetching the digest list.
    pub retry: RetryConfig,
    /// Interval for periodic passes.
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(logbook: impl Into<String>, peer_url: Url) -> Self {
        Self {
            logbook: logbook.into(),
            peer_url,
            timeout: Duration::from_secs(30),
            deletion_policy: DeletionPolicy::default(),
            cache_dir: None,
            retry: RetryConfig::default(),
            sync_interval: None,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the deletion policy.
    #[must_use]
    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    /// Sets the mirror cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the sync interval for periodic passes.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Returns the key identifying the peer: host and port with anything
    /// unsafe in a file name replaced by `_`.
    pub fn peer_key(&self) -> String {
        let host = self.peer_url.host_str().unwrap_or("local");
        let key = match self.peer_url.port_or_known_default() {
            Some(port) => format!("{host}_{port}"),
            None => host.to_string(),
        };
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Returns the mirror cache path, using `data_dir` when no cache
    /// directory is configured.
    pub fn cache_path(&self, data_dir: &Path) -> PathBuf {
        let dir = self.cache_dir.as_deref().unwrap_or(data_dir);
        dir.join(format!("{}.{}.mirror", self.logbook, self.peer_key()))
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter
            let jitter = delay_secs * 0.25 * rand_jitter();
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Cheap pseudo-random jitter from the clock.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Url {
        Url::parse("https://elog.example.org:8080/").unwrap()
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("Linac", peer())
            .with_timeout(Duration::from_secs(5))
            .with_deletion_policy(DeletionPolicy::Automatic)
            .with_sync_interval(Duration::from_secs(600));

        assert_eq!(config.logbook, "Linac");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.deletion_policy, DeletionPolicy::Automatic);
        assert_eq!(config.sync_interval, Some(Duration::from_secs(600)));
    }

    #[test]
    fn deletions_need_confirmation_by_default() {
        let config = SyncConfig::new("Linac", peer());
        assert_eq!(config.deletion_policy, DeletionPolicy::Confirm);
    }

    #[test]
    fn cache_path_names_logbook_and_peer() {
        let config = SyncConfig::new("Linac", peer());
        let path = config.cache_path(Path::new("/data/linac"));
        assert_eq!(
            path,
            Path::new("/data/linac/Linac.elog.example.org_8080.mirror")
        );

        let config = config.with_cache_dir("/var/cache/elog");
        let path = config.cache_path(Path::new("/data/linac"));
        assert!(path.starts_with("/var/cache/elog"));
    }

    #[test]
    fn peer_key_uses_default_port() {
        let config = SyncConfig::new("Linac", Url::parse("http://peer/elog/").unwrap());
        assert_eq!(config.peer_key(), "peer_80");
    }

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(150));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        assert!(delay <= Duration::from_millis(6250));
    }
}
