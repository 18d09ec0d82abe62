//! Runtime configuration: game rules, background task cadence and the catalog location.

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::game::{CleanupConfig, EnforcerConfig};

const PORT_ENV: &str = "PORT";
const ENFORCER_INTERVAL_ENV: &str = "HIDESEEK_ENFORCER_INTERVAL_SECS";
const IDLE_HOURS_ENV: &str = "HIDESEEK_IDLE_HOURS";
const STARTING_TOKENS_ENV: &str = "HIDESEEK_STARTING_TOKENS";
const CATALOG_PATH_ENV: &str = "HIDESEEK_CATALOG_PATH";

const DEFAULT_PORT: u16 = 8080;

/// Constants that shape play for every game in the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Tokens each team starts with, and is reset to on restart
    pub starting_tokens: i64,
    /// How long a seeker is blocked from drawing after refusing a challenge
    pub veto_duration: Duration,
    /// Lifetime of the penalty curse attached to a refused challenge
    pub refusal_curse_duration: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            starting_tokens: 10,
            veto_duration: Duration::from_secs(5 * 60),
            refusal_curse_duration: Duration::from_secs(5 * 60),
        }
    }
}

impl GameRules {
    pub fn veto_ms(&self) -> i64 {
        self.veto_duration.as_millis() as i64
    }

    pub fn refusal_curse_ms(&self) -> i64 {
        self.refusal_curse_duration.as_millis() as i64
    }
}

#[derive(Debug, Clone)]
/// Immutable process configuration assembled at startup.
pub struct AppConfig {
    pub port: u16,
    pub rules: GameRules,
    pub enforcer: EnforcerConfig,
    pub cleanup: CleanupConfig,
    /// Optional JSON catalog; the built-in deck is used when absent
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            rules: GameRules::default(),
            enforcer: EnforcerConfig::default(),
            cleanup: CleanupConfig::default(),
            catalog_path: None,
        }
    }
}

impl AppConfig {
    /// Read overrides from the environment, keeping defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = parse_var::<u16>(&lookup, PORT_ENV) {
            config.port = port;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENFORCER_INTERVAL_ENV).filter(|s| *s > 0) {
            config.enforcer.tick_interval = Duration::from_secs(secs);
        }
        if let Some(hours) = parse_var::<u64>(&lookup, IDLE_HOURS_ENV).filter(|h| *h > 0) {
            config.cleanup.inactivity_threshold = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(tokens) = parse_var::<i64>(&lookup, STARTING_TOKENS_ENV) {
            config.rules.starting_tokens = tokens;
        }
        config.catalog_path = lookup(CATALOG_PATH_ENV)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        info!(
            port = config.port,
            enforcer_interval_secs = config.enforcer.tick_interval.as_secs(),
            inactivity_threshold_secs = config.cleanup.inactivity_threshold.as_secs(),
            starting_tokens = config.rules.starting_tokens,
            catalog_path = ?config.catalog_path,
            "resolved application config"
        );

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed config value");
            None
        }
    }
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
    fn test_defaults_match_game_rules() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.rules.starting_tokens, 10);
        assert_eq!(config.rules.veto_ms(), 300_000);
        assert_eq!(config.rules.refusal_curse_ms(), 300_000);
        assert_eq!(config.enforcer.tick_interval, Duration::from_secs(5));
        assert_eq!(
            config.cleanup.inactivity_threshold,
            Duration::from_secs(12 * 60 * 60)
        );
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_env_overrides_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("HIDESEEK_ENFORCER_INTERVAL_SECS", "2"),
            ("HIDESEEK_IDLE_HOURS", "1"),
            ("HIDESEEK_STARTING_TOKENS", "25"),
            ("HIDESEEK_CATALOG_PATH", "deck.json"),
        ]));

        assert_eq!(config.port, 9000);
        assert_eq!(config.enforcer.tick_interval, Duration::from_secs(2));
        assert_eq!(config.cleanup.inactivity_threshold, Duration::from_secs(3600));
        assert_eq!(config.rules.starting_tokens, 25);
        assert_eq!(config.catalog_path, Some(PathBuf::from("deck.json")));
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("HIDESEEK_ENFORCER_INTERVAL_SECS", "0"),
        ]));

        assert_eq!(config.port, 8080);
        assert_eq!(config.enforcer.tick_interval, Duration::from_secs(5));
    }
}
