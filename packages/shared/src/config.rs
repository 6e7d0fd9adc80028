use std::env;
use std::fmt;
use std::time::Duration;

pub const ROOMS_TABLE: &str = "ROOMS_TABLE";
pub const MATCHMAKING_TABLE: &str = "MATCHMAKING_TABLE";
pub const USER_ROOMS_TABLE: &str = "USER_ROOMS_TABLE";
pub const ROOM_WATCH_POLL_MS: &str = "ROOM_WATCH_POLL_MS";
pub const JWT_SECRET: &str = "JWT_SECRET";

const DEFAULT_WATCH_POLL_MS: u64 = 500;

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(String),
    Invalid { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => {
                write!(f, "{} environment variable must be set", key)
            }
            ConfigError::Invalid { key, value } => {
                write!(f, "{} has invalid value '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Table names and subscription tuning for the DynamoDB backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub rooms_table: String,
    pub matchmaking_table: String,
    pub memberships_table: String,
    pub watch_poll_interval: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };

        let poll_ms = match lookup(ROOM_WATCH_POLL_MS) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: ROOM_WATCH_POLL_MS.to_string(),
                        value,
                    })
                }
            },
            None => DEFAULT_WATCH_POLL_MS,
        };

        Ok(StoreConfig {
            rooms_table: required(ROOMS_TABLE)?,
            matchmaking_table: required(MATCHMAKING_TABLE)?,
            memberships_table: required(USER_ROOMS_TABLE)?,
            watch_poll_interval: Duration::from_millis(poll_ms),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConfig {
    pub jwt_secret: String,
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(JWT_SECRET) {
            Ok(secret) if !secret.is_empty() => Ok(IdentityConfig { jwt_secret: secret }),
            _ => Err(ConfigError::Missing(JWT_SECRET.to_string())),
        }
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_store_config_reads_tables_and_defaults_poll_interval() {
        let config = StoreConfig::from_lookup(lookup(&[
            (ROOMS_TABLE, "rooms"),
            (MATCHMAKING_TABLE, "matchmaking"),
            (USER_ROOMS_TABLE, "user-rooms"),
        ]))
        .unwrap();

        assert_eq!(config.rooms_table, "rooms");
        assert_eq!(config.matchmaking_table, "matchmaking");
        assert_eq!(config.memberships_table, "user-rooms");
        assert_eq!(config.watch_poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_store_config_missing_table() {
        let err = StoreConfig::from_lookup(lookup(&[(ROOMS_TABLE, "rooms")])).unwrap_err();

        assert_eq!(err, ConfigError::Missing(MATCHMAKING_TABLE.to_string()));
        assert_eq!(
            err.to_string(),
            "MATCHMAKING_TABLE environment variable must be set"
        );
    }

    #[test]
    fn test_store_config_rejects_bad_poll_interval() {
        let err = StoreConfig::from_lookup(lookup(&[
            (ROOMS_TABLE, "rooms"),
            (MATCHMAKING_TABLE, "matchmaking"),
            (USER_ROOMS_TABLE, "user-rooms"),
            (ROOM_WATCH_POLL_MS, "0"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
