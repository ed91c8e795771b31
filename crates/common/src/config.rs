use std::collections::HashSet;
use std::str::FromStr;

use serde::Deserialize;

/// Default queue category the notification worker listens on.
pub const DEFAULT_QUEUE_NAME: &str = "push_notification_code_2";

/// Recipients that are rejected unless `NOTIFIER_BLACKLIST` says otherwise.
pub const DEFAULT_BLACKLIST: &str = "4153518780,4153518781";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection string
    pub redis_url: String,

    /// Job category the notifier processes
    pub queue_name: String,

    /// Maximum number of in-flight notification jobs (default: 2)
    pub concurrency: usize,

    /// Interval between delivery ticks in milliseconds (default: 1000)
    pub tick_interval_ms: u64,

    /// Simulated work units per delivery (default: 2)
    pub work_units: u32,

    /// Phone numbers that always fail delivery
    pub blacklist: HashSet<String>,

    /// How long a single dequeue blocks before re-checking for shutdown
    pub poll_timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let concurrency: usize = parse_or(&lookup, "NOTIFIER_CONCURRENCY", 2)?;
        if concurrency == 0 {
            anyhow::bail!("NOTIFIER_CONCURRENCY must be at least 1");
        }

        let tick_interval_ms: u64 = parse_or(&lookup, "NOTIFIER_TICK_MS", 1000)?;
        if tick_interval_ms == 0 {
            anyhow::bail!("NOTIFIER_TICK_MS must be at least 1");
        }

        let poll_timeout_secs: u64 = parse_or(&lookup, "QUEUE_POLL_TIMEOUT_SECS", 1)?;
        if poll_timeout_secs == 0 {
            anyhow::bail!("QUEUE_POLL_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            queue_name: lookup("NOTIFIER_QUEUE").unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string()),
            concurrency,
            tick_interval_ms,
            work_units: parse_or(&lookup, "NOTIFIER_WORK_UNITS", 2)?,
            blacklist: parse_blacklist(
                &lookup("NOTIFIER_BLACKLIST").unwrap_or_else(|| DEFAULT_BLACKLIST.to_string()),
            ),
            poll_timeout_secs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid {}", key, std::any::type_name::<T>())),
        None => Ok(default),
    }
}

/// Split a comma-separated list of phone numbers, ignoring blanks.
pub fn parse_blacklist(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.queue_name, "push_notification_code_2");
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.work_units, 2);
        assert_eq!(config.poll_timeout_secs, 1);
        assert!(config.blacklist.contains("4153518780"));
        assert!(config.blacklist.contains("4153518781"));
        assert_eq!(config.blacklist.len(), 2);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("REDIS_URL", "redis://cache:6380"),
            ("NOTIFIER_QUEUE", "sms"),
            ("NOTIFIER_CONCURRENCY", "8"),
            ("NOTIFIER_TICK_MS", "250"),
            ("NOTIFIER_WORK_UNITS", "5"),
            ("NOTIFIER_BLACKLIST", "111, 222,,"),
        ]))
        .unwrap();
        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.queue_name, "sms");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.work_units, 5);
        assert_eq!(config.blacklist, parse_blacklist("111,222"));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("NOTIFIER_TICK_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("NOTIFIER_TICK_MS"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("NOTIFIER_CONCURRENCY", "0")])).is_err());
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        assert!(AppConfig::from_lookup(lookup_from(&[("NOTIFIER_TICK_MS", "0")])).is_err());
    }

    #[test]
    fn test_zero_poll_timeout_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("QUEUE_POLL_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("QUEUE_POLL_TIMEOUT_SECS"));
    }

    #[test]
    fn test_empty_blacklist() {
        let config = AppConfig::from_lookup(lookup_from(&[("NOTIFIER_BLACKLIST", "")])).unwrap();
        assert!(config.blacklist.is_empty());
    }
}
