//! Configuration error types.
//!
//! Configuration validation is the only fatal failure class in Strata:
//! a malformed policy aborts startup instead of driving the cluster
//! with bad thresholds.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating the scaler configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no tiers configured")]
    NoTiers,

    #[error("duplicate tier name: {0}")]
    DuplicateTier(String),

    #[error("tier {tier}: {field} must be within (0, 100], got {value}")]
    BadThreshold {
        tier: String,
        field: &'static str,
        value: f64,
    },

    #[error("tier {tier}: {field} must be at least 1")]
    BadCount { tier: String, field: &'static str },

    #[error("tier {tier} has no zones")]
    NoZones { tier: String },

    #[error("tier {tier} references unknown zone {zone}")]
    UnknownZone { tier: String, zone: String },

    #[error("invalid duration {value:?} for {field}")]
    BadDuration { field: &'static str, value: String },

    #[error("max_unreachable_fraction must be within [0, 1], got {0}")]
    BadFraction(f64),
}
