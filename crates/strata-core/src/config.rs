//! strata.toml configuration parser and validation.
//!
//! The raw file shape (`StrataConfig`) is deserialized with serde and
//! then resolved into validated [`Settings`] / [`TierPolicy`] values.
//! Resolution fails loudly: the control loop never starts with a
//! malformed policy. Configuration is loaded once at startup and not
//! reloaded mid-run.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{TierName, ZoneId};

/// Raw on-disk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    pub poll_interval: Option<String>,
    pub default_cooldown: Option<String>,
    pub dry_run: Option<bool>,
    pub max_unreachable_fraction: Option<f64>,
    pub metrics_timeout: Option<String>,
    pub submit_timeout: Option<String>,
    pub operation_timeout: Option<String>,
    pub zones: Vec<ZoneId>,
    #[serde(rename = "tier", default)]
    pub tiers: Vec<TierConfig>,
}

/// Raw per-tier policy as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: TierName,
    /// Node name prefix; defaults to `<name>-`.
    pub node_prefix: Option<String>,
    /// Ordered zone list; must be a subset of the global zones.
    pub zones: Vec<ZoneId>,
    pub down_threshold_percent: f64,
    /// Nodes below the down threshold needed to trigger a drain.
    pub down_trigger_count: u32,
    /// Maximum nodes removed per action.
    pub decommission_count: u32,
    pub up_threshold_percent: f64,
    /// Minimum number of nodes with headroom; fewer than this grows
    /// the tier.
    pub headroom_min_count: u32,
    /// Nodes added per action.
    pub provision_count: u32,
    /// Per-tier cooldown; defaults to the global default_cooldown.
    pub cooldown: Option<String>,
    /// Never drain a zone below this many nodes.
    pub min_per_zone: Option<u32>,
}

/// Validated global settings for one control-loop run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub poll_interval: Duration,
    pub dry_run: bool,
    /// Skip a tier when at least this fraction of it is unreachable.
    pub max_unreachable_fraction: f64,
    pub metrics_timeout: Duration,
    pub submit_timeout: Duration,
    /// Pending operations older than this are treated as failed.
    pub operation_timeout: Duration,
    pub zones: Vec<ZoneId>,
    pub tiers: Vec<TierPolicy>,
}

/// Validated scaling policy for a single tier. Immutable during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    pub tier: TierName,
    pub node_prefix: String,
    pub zones: Vec<ZoneId>,
    pub down_threshold_percent: f64,
    pub down_trigger_count: u32,
    pub decommission_count: u32,
    pub up_threshold_percent: f64,
    pub headroom_min_count: u32,
    pub provision_count: u32,
    pub cooldown: Duration,
    pub min_per_zone: u32,
}

impl StrataConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: StrataConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the raw config and resolve defaults.
    pub fn resolve(&self) -> ConfigResult<Settings> {
        if self.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }

        let fraction = self.max_unreachable_fraction.unwrap_or(0.3);
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ConfigError::BadFraction(fraction));
        }

        let poll_interval =
            resolve_duration("poll_interval", self.poll_interval.as_deref(), "30s")?;
        let default_cooldown =
            resolve_duration("default_cooldown", self.default_cooldown.as_deref(), "10m")?;
        let metrics_timeout =
            resolve_duration("metrics_timeout", self.metrics_timeout.as_deref(), "10s")?;
        let submit_timeout =
            resolve_duration("submit_timeout", self.submit_timeout.as_deref(), "30s")?;
        let operation_timeout =
            resolve_duration("operation_timeout", self.operation_timeout.as_deref(), "15m")?;

        let known_zones: HashSet<&str> = self.zones.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut tiers = Vec::with_capacity(self.tiers.len());

        for tier in &self.tiers {
            if !seen.insert(tier.name.clone()) {
                return Err(ConfigError::DuplicateTier(tier.name.clone()));
            }
            tiers.push(tier.resolve(&known_zones, default_cooldown)?);
        }

        Ok(Settings {
            poll_interval,
            dry_run: self.dry_run.unwrap_or(false),
            max_unreachable_fraction: fraction,
            metrics_timeout,
            submit_timeout,
            operation_timeout,
            zones: self.zones.clone(),
            tiers,
        })
    }
}

impl TierConfig {
    fn resolve(
        &self,
        known_zones: &HashSet<&str>,
        default_cooldown: Duration,
    ) -> ConfigResult<TierPolicy> {
        check_threshold(&self.name, "down_threshold_percent", self.down_threshold_percent)?;
        check_threshold(&self.name, "up_threshold_percent", self.up_threshold_percent)?;

        if self.decommission_count == 0 {
            return Err(ConfigError::BadCount {
                tier: self.name.clone(),
                field: "decommission_count",
            });
        }
        if self.provision_count == 0 {
            return Err(ConfigError::BadCount {
                tier: self.name.clone(),
                field: "provision_count",
            });
        }

        if self.zones.is_empty() {
            return Err(ConfigError::NoZones {
                tier: self.name.clone(),
            });
        }
        for zone in &self.zones {
            if !known_zones.contains(zone.as_str()) {
                return Err(ConfigError::UnknownZone {
                    tier: self.name.clone(),
                    zone: zone.clone(),
                });
            }
        }

        let cooldown = match self.cooldown.as_deref() {
            Some(s) => parse_duration(s).ok_or_else(|| ConfigError::BadDuration {
                field: "cooldown",
                value: s.to_string(),
            })?,
            None => default_cooldown,
        };

        Ok(TierPolicy {
            tier: self.name.clone(),
            node_prefix: self
                .node_prefix
                .clone()
                .unwrap_or_else(|| format!("{}-", self.name)),
            zones: self.zones.clone(),
            down_threshold_percent: self.down_threshold_percent,
            down_trigger_count: self.down_trigger_count,
            decommission_count: self.decommission_count,
            up_threshold_percent: self.up_threshold_percent,
            headroom_min_count: self.headroom_min_count,
            provision_count: self.provision_count,
            cooldown,
            min_per_zone: self.min_per_zone.unwrap_or(1),
        })
    }
}

fn check_threshold(tier: &str, field: &'static str, value: f64) -> ConfigResult<()> {
    if value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::BadThreshold {
            tier: tier.to_string(),
            field,
            value,
        })
    }
}

fn resolve_duration(
    field: &'static str,
    value: Option<&str>,
    default: &str,
) -> ConfigResult<Duration> {
    let raw = value.unwrap_or(default);
    parse_duration(raw).ok_or_else(|| ConfigError::BadDuration {
        field,
        value: raw.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
