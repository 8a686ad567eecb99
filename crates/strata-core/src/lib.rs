//! strata-core — shared domain types and configuration for the Strata
//! capacity autoscaler.
//!
//! # Components
//!
//! - **`types`** — node snapshots, operation records, per-tier state
//! - **`config`** — strata.toml parsing and fatal startup validation
//! - **`registry`** — the guarded per-tier state arena
//! - **`error`** — configuration error taxonomy

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{parse_duration, Settings, StrataConfig, TierConfig, TierPolicy};
pub use error::{ConfigError, ConfigResult};
pub use registry::TierRegistry;
pub use types::{
    NodeName, NodeSnapshot, OperationKind, OperationRecord, OperationStatus, TierName,
    TierSnapshot, TierState, ZoneId,
};
