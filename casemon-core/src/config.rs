//! Environment-sourced configuration.
//!
//! Variable names and defaults match the deployment manifests the service has
//! always shipped with, so existing `.env` files keep working.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Longest accepted retry or keepalive duration (one day).
pub const MAX_TIMER: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounded retry schedule: keep trying every `interval` until `window` has
/// elapsed since the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub window: Duration,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            interval: Duration::from_secs(2),
        }
    }
}

/// TCP keepalive parameters requested for database sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    pub idle: Duration,
    pub interval: Duration,
    pub count: u32,
}

impl KeepaliveConfig {
    /// How long a socket may sit idle before a dead peer would have been
    /// detected: `idle + interval * count`, saturating.
    pub fn dead_peer_after(&self) -> Duration {
        self.interval
            .checked_mul(self.count)
            .and_then(|probes| self.idle.checked_add(probes))
            .unwrap_or(Duration::MAX)
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(30),
            interval: Duration::from_secs(10),
            count: 5,
        }
    }
}

/// PostgreSQL connection and pool settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub statement_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_min: u32,
    pub pool_max: u32,
    pub startup_retry: RetryPolicy,
    pub keepalive: KeepaliveConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            name: "case_study".to_string(),
            user: "postgres".to_string(),
            password: "admin123".to_string(),
            statement_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_secs(5),
            pool_min: 1,
            pool_max: 10,
            startup_retry: RetryPolicy::default(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

// Hand-written so the password never lands in logs.
impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"***")
            .field("statement_timeout", &self.statement_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_min", &self.pool_min)
            .field("pool_max", &self.pool_max)
            .field("startup_retry", &self.startup_retry)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

impl DbConfig {
    /// Load from process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Lookup(&lookup);

        let config = Self {
            host: env.string("DB_HOST").unwrap_or(defaults.host),
            port: env.parsed("DB_PORT")?.unwrap_or(defaults.port),
            name: env.string("DB_NAME").unwrap_or(defaults.name),
            user: env.string("DB_USER").unwrap_or(defaults.user),
            password: env.string("DB_PASS").unwrap_or(defaults.password),
            statement_timeout: env
                .parsed::<u64>("STATEMENT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.statement_timeout),
            connect_timeout: env
                .parsed::<u64>("CONNECT_TIMEOUT_S")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            pool_min: env.parsed("DB_POOL_MIN")?.unwrap_or(defaults.pool_min),
            pool_max: env.parsed("DB_POOL_MAX")?.unwrap_or(defaults.pool_max),
            startup_retry: RetryPolicy {
                window: env
                    .parsed::<u64>("DB_STARTUP_RETRY_SECONDS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.startup_retry.window),
                interval: env
                    .seconds_f64("DB_STARTUP_RETRY_INTERVAL")?
                    .unwrap_or(defaults.startup_retry.interval),
            },
            keepalive: KeepaliveConfig {
                idle: env
                    .parsed::<u64>("DB_KEEPALIVES_IDLE")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.keepalive.idle),
                interval: env
                    .parsed::<u64>("DB_KEEPALIVES_INTERVAL")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.keepalive.interval),
                count: env
                    .parsed("DB_KEEPALIVES_COUNT")?
                    .unwrap_or(defaults.keepalive.count),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_max == 0 {
            return Err(ConfigError::inconsistent("DB_POOL_MAX must be at least 1"));
        }
        if self.pool_min > self.pool_max {
            return Err(ConfigError::inconsistent(format!(
                "DB_POOL_MIN ({}) exceeds DB_POOL_MAX ({})",
                self.pool_min, self.pool_max
            )));
        }
        for (var, value) in [
            ("DB_STARTUP_RETRY_SECONDS", self.startup_retry.window),
            ("DB_STARTUP_RETRY_INTERVAL", self.startup_retry.interval),
            ("DB_KEEPALIVES_IDLE", self.keepalive.idle),
            ("DB_KEEPALIVES_INTERVAL", self.keepalive.interval),
        ] {
            if value > MAX_TIMER {
                return Err(ConfigError::inconsistent(format!(
                    "{var} ({}s) exceeds the {}s maximum",
                    value.as_secs_f64(),
                    MAX_TIMER.as_secs()
                )));
            }
        }
        Ok(())
    }
}

/// Full service configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    /// Shared secret expected in `Authorization: Bearer <token>`.
    /// `None` rejects every webhook delivery.
    pub webhook_token: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("db", &self.db)
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = DbConfig::from_lookup(&lookup)?;
        let webhook_token = Lookup(&lookup).string("WEBHOOK_TOKEN");
        Ok(Self { db, webhook_token })
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Empty values count as unset.
    fn string(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn parsed<T>(&self, var: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.string(var)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| ConfigError::invalid(var, raw.clone(), e))
            })
            .transpose()
    }

    fn seconds_f64(&self, var: &'static str) -> Result<Option<Duration>, ConfigError> {
        let Some(secs) = self.parsed::<f64>(var)? else {
            return Ok(None);
        };
        Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| ConfigError::invalid(var, secs.to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db, DbConfig::default());
        assert_eq!(config.db.port, 5432);
        assert_eq!(config.db.startup_retry.window, Duration::from_secs(60));
        assert_eq!(config.db.startup_retry.interval, Duration::from_secs(2));
        assert!(config.webhook_token.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("STATEMENT_TIMEOUT_MS", "250"),
            ("DB_POOL_MIN", "2"),
            ("DB_POOL_MAX", "4"),
            ("DB_STARTUP_RETRY_SECONDS", "5"),
            ("DB_STARTUP_RETRY_INTERVAL", "0.5"),
            ("WEBHOOK_TOKEN", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.db.host, "db.internal");
        assert_eq!(config.db.port, 6543);
        assert_eq!(config.db.statement_timeout, Duration::from_millis(250));
        assert_eq!((config.db.pool_min, config.db.pool_max), (2, 4));
        assert_eq!(config.db.startup_retry.window, Duration::from_secs(5));
        assert_eq!(config.db.startup_retry.interval, Duration::from_millis(500));
        assert_eq!(config.webhook_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn malformed_number_names_the_variable() {
        let err = DbConfig::from_lookup(lookup(&[("DB_PORT", "five")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DB_PORT", .. }));
    }

    #[test]
    fn negative_interval_rejected() {
        let err = DbConfig::from_lookup(lookup(&[("DB_STARTUP_RETRY_INTERVAL", "-1")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "DB_STARTUP_RETRY_INTERVAL",
                ..
            }
        ));
    }

    #[test]
    fn pool_bounds_must_be_ordered() {
        let err = DbConfig::from_lookup(lookup(&[("DB_POOL_MIN", "8"), ("DB_POOL_MAX", "4")])).unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent { .. }));

        let err = DbConfig::from_lookup(lookup(&[("DB_POOL_MIN", "0"), ("DB_POOL_MAX", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Inconsistent { .. }));
    }

    #[test]
    fn oversized_timers_are_rejected() {
        for (var, value) in [
            ("DB_STARTUP_RETRY_SECONDS", "18446744073709551615"),
            ("DB_STARTUP_RETRY_INTERVAL", "1e7"),
            ("DB_KEEPALIVES_IDLE", "86401"),
            ("DB_KEEPALIVES_INTERVAL", "18446744073709551615"),
        ] {
            let err = DbConfig::from_lookup(lookup(&[(var, value)])).unwrap_err();
            match err {
                ConfigError::Inconsistent { reason } => assert!(reason.contains(var), "{reason}"),
                other => panic!("{var}: expected Inconsistent, got {other:?}"),
            }
        }

        let config = DbConfig::from_lookup(lookup(&[("DB_STARTUP_RETRY_SECONDS", "86400")])).unwrap();
        assert_eq!(config.startup_retry.window, MAX_TIMER);
    }

    #[test]
    fn dead_peer_window_saturates() {
        let keepalive = KeepaliveConfig::default();
        assert_eq!(keepalive.dead_peer_after(), Duration::from_secs(80));

        let huge = KeepaliveConfig {
            idle: Duration::from_secs(1),
            interval: Duration::from_secs(u64::MAX),
            count: u32::MAX,
        };
        assert_eq!(huge.dead_peer_after(), Duration::MAX);
    }

    #[test]
    fn empty_token_is_unset() {
        let config = AppConfig::from_lookup(lookup(&[("WEBHOOK_TOKEN", "  ")])).unwrap();
        assert!(config.webhook_token.is_none());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig::from_lookup(lookup(&[("DB_PASS", "hunter2"), ("WEBHOOK_TOKEN", "tok")])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("\"tok\""));
    }
}
