//! Gate configuration.
//!
//! Parameters of the shared membership structure and of the cycles that
//! (re)build it. Capacity and false-positive rate only take effect at the
//! next (re)initialization; an existing structure keeps the geometry it was
//! created with.

use crate::constants::*;
use crate::ConfigError;
use chrono::NaiveTime;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// GATE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct GateConfig {
    /// Name of the shared Bloom filter.
    pub bloom_name: String,

    /// Expected insertions used to size the filter.
    pub expected_insertions: u64,

    /// Target false-positive rate, in (0, 1).
    pub false_probability: f64,

    /// Name of the lease guarding build cycles.
    pub lease_name: String,

    /// Lease hold; the only backstop for a crashed holder.
    pub lease_hold: Duration,

    /// Identifiers per population batch.
    pub population_batch_size: usize,

    /// Wall-clock time (UTC) of the daily rebuild.
    pub rebuild_at: NaiveTime,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bloom_name: DEFAULT_BLOOM_NAME.to_string(),
            expected_insertions: DEFAULT_EXPECTED_INSERTIONS,
            false_probability: DEFAULT_FALSE_PROBABILITY,
            lease_name: DEFAULT_LEASE_NAME.to_string(),
            lease_hold: Duration::from_secs(DEFAULT_LEASE_HOLD_SECS),
            population_batch_size: DEFAULT_POPULATION_BATCH_SIZE,
            rebuild_at: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl GateConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONSENTGATE_BLOOM_NAME` (default: emd-bloom-filter)
    /// - `CONSENTGATE_BLOOM_EXPECTED_INSERTIONS` (default: 1000000)
    /// - `CONSENTGATE_BLOOM_FALSE_PROBABILITY` (default: 0.01)
    /// - `CONSENTGATE_LEASE_NAME` (default: startup-task-lock)
    /// - `CONSENTGATE_LEASE_HOLD_SECS` (default: 60)
    /// - `CONSENTGATE_POPULATION_BATCH_SIZE` (default: 100)
    /// - `CONSENTGATE_REBUILD_AT`: `HH:MM` in UTC (default: 04:00)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GateConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let rebuild_at = match lookup("CONSENTGATE_REBUILD_AT") {
            Some(raw) => parse_wall_clock("CONSENTGATE_REBUILD_AT", &raw)?,
            None => parse_wall_clock("CONSENTGATE_REBUILD_AT", DEFAULT_REBUILD_AT)?,
        };

        let config = Self {
            bloom_name: lookup("CONSENTGATE_BLOOM_NAME").unwrap_or(defaults.bloom_name),
            expected_insertions: parse_or(
                &lookup,
                "CONSENTGATE_BLOOM_EXPECTED_INSERTIONS",
                defaults.expected_insertions,
            )?,
            false_probability: parse_or(
                &lookup,
                "CONSENTGATE_BLOOM_FALSE_PROBABILITY",
                defaults.false_probability,
            )?,
            lease_name: lookup("CONSENTGATE_LEASE_NAME").unwrap_or(defaults.lease_name),
            lease_hold: Duration::from_secs(parse_or(
                &lookup,
                "CONSENTGATE_LEASE_HOLD_SECS",
                DEFAULT_LEASE_HOLD_SECS,
            )?),
            population_batch_size: parse_or(
                &lookup,
                "CONSENTGATE_POPULATION_BATCH_SIZE",
                defaults.population_batch_size,
            )?,
            rebuild_at,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values no cycle could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bloom_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "bloom_name".to_string(),
            });
        }
        if self.lease_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "lease_name".to_string(),
            });
        }
        if self.expected_insertions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "expected_insertions".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(self.false_probability > 0.0 && self.false_probability < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "false_probability".to_string(),
                value: self.false_probability.to_string(),
                reason: "must be between 0 and 1 (exclusive)".to_string(),
            });
        }
        if self.lease_hold.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "lease_hold".to_string(),
                value: "0".to_string(),
                reason: "must be at least one second".to_string(),
            });
        }
        if self.population_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "population_batch_size".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_wall_clock(key: &str, raw: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| ConfigError::InvalidValue {
        field: key.to_string(),
        value: raw.to_string(),
        reason: format!("expected HH:MM ({})", e),
    })
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
    fn test_defaults_when_nothing_set() {
        let config = GateConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.bloom_name, "emd-bloom-filter");
        assert_eq!(config.lease_name, "startup-task-lock");
        assert_eq!(config.lease_hold, Duration::from_secs(60));
        assert_eq!(config.population_batch_size, 100);
        assert_eq!(config.rebuild_at, NaiveTime::from_hms_opt(4, 0, 0).unwrap());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = GateConfig::from_lookup(lookup_from(&[
            ("CONSENTGATE_BLOOM_NAME", "test-filter"),
            ("CONSENTGATE_BLOOM_EXPECTED_INSERTIONS", "5000"),
            ("CONSENTGATE_BLOOM_FALSE_PROBABILITY", "0.001"),
            ("CONSENTGATE_POPULATION_BATCH_SIZE", "25"),
            ("CONSENTGATE_REBUILD_AT", "23:30"),
        ]))
        .unwrap();
        assert_eq!(config.bloom_name, "test-filter");
        assert_eq!(config.expected_insertions, 5000);
        assert_eq!(config.false_probability, 0.001);
        assert_eq!(config.population_batch_size, 25);
        assert_eq!(config.rebuild_at, NaiveTime::from_hms_opt(23, 30, 0).unwrap());
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let err = GateConfig::from_lookup(lookup_from(&[(
            "CONSENTGATE_BLOOM_FALSE_PROBABILITY",
            "1.5",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "false_probability"));
    }

    #[test]
    fn test_rejects_unparseable_values() {
        assert!(GateConfig::from_lookup(lookup_from(&[(
            "CONSENTGATE_BLOOM_EXPECTED_INSERTIONS",
            "lots"
        )]))
        .is_err());
        assert!(GateConfig::from_lookup(lookup_from(&[("CONSENTGATE_REBUILD_AT", "4am")])).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = GateConfig::default();
        config.population_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.expected_insertions = 0;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.lease_hold = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = GateConfig::default();
        config.bloom_name = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }
}
