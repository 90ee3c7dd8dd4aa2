//! Engine configuration

use std::env;
use std::time::Duration;

use deskflow_shared::{
    SlaPolicy, DEFAULT_SLA_RESOLUTION_HOURS, DEFAULT_SLA_RESPONSE_HOURS, MAX_SLA_HOURS,
};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ASSIGNMENT_INTERVAL_SECS: u64 = 10;
const DEFAULT_SLA_CHECK_INTERVAL_SECS: u64 = 60;

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Scheduling
    pub assignment_interval: Duration,
    pub sla_check_interval: Duration,

    // Seed for the queue configuration row when it is first created
    pub sla_response_hours: i32,
    pub sla_resolution_hours: i32,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let assignment_secs = env_or("ASSIGNMENT_INTERVAL_SECS", DEFAULT_ASSIGNMENT_INTERVAL_SECS);
        if assignment_secs == 0 {
            return Err(ConfigError::Invalid("ASSIGNMENT_INTERVAL_SECS must be greater than 0"));
        }

        let sla_check_secs = env_or("SLA_CHECK_INTERVAL_SECS", DEFAULT_SLA_CHECK_INTERVAL_SECS);
        if sla_check_secs == 0 {
            return Err(ConfigError::Invalid("SLA_CHECK_INTERVAL_SECS must be greater than 0"));
        }

        let sla_response_hours = env_or("SLA_RESPONSE_HOURS", DEFAULT_SLA_RESPONSE_HOURS);
        if !(1..=MAX_SLA_HOURS).contains(&sla_response_hours) {
            return Err(ConfigError::Invalid("SLA_RESPONSE_HOURS must be between 1 and 8784"));
        }

        let sla_resolution_hours = env_or("SLA_RESOLUTION_HOURS", DEFAULT_SLA_RESOLUTION_HOURS);
        if !(1..=MAX_SLA_HOURS).contains(&sla_resolution_hours) {
            return Err(ConfigError::Invalid("SLA_RESOLUTION_HOURS must be between 1 and 8784"));
        }

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),

            assignment_interval: Duration::from_secs(assignment_secs),
            sla_check_interval: Duration::from_secs(sla_check_secs),

            sla_response_hours,
            sla_resolution_hours,
        })
    }

    pub fn sla_policy(&self) -> SlaPolicy {
        SlaPolicy {
            response_hours: self.sla_response_hours,
            resolution_hours: self.sla_resolution_hours,
        }
    }
}

/// Parse a variable, falling back to `default` when unset or unparseable
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "DATABASE_URL",
        "DATABASE_MAX_CONNECTIONS",
        "ASSIGNMENT_INTERVAL_SECS",
        "SLA_CHECK_INTERVAL_SECS",
        "SLA_RESPONSE_HOURS",
        "SLA_RESOLUTION_HOURS",
    ];

    fn cleanup_config() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.assignment_interval, Duration::from_secs(10));
        assert_eq!(config.sla_check_interval, Duration::from_secs(60));
        assert_eq!(config.sla_policy(), SlaPolicy::default());

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_missing_database_url() {
        cleanup_config();

        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    #[serial]
    fn test_overrides_and_unparseable_fallback() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("ASSIGNMENT_INTERVAL_SECS", "3");
        env::set_var("SLA_RESPONSE_HOURS", "4");
        env::set_var("SLA_RESOLUTION_HOURS", "not-a-number");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.assignment_interval, Duration::from_secs(3));
        assert_eq!(config.sla_response_hours, 4);
        assert_eq!(config.sla_resolution_hours, 24);

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_zero_interval_rejected() {
        cleanup_config();
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("SLA_CHECK_INTERVAL_SECS", "0");

        let result = EngineConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_sla_hours_out_of_range_rejected() {
        for (var, value) in [
            ("SLA_RESPONSE_HOURS", "0"),
            ("SLA_RESPONSE_HOURS", "-3"),
            ("SLA_RESOLUTION_HOURS", "100000000"),
        ] {
            cleanup_config();
            env::set_var("DATABASE_URL", "postgres://test");
            env::set_var(var, value);

            let result = EngineConfig::from_env();
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{}={} should be rejected",
                var,
                value
            );
        }

        cleanup_config();
    }
}
