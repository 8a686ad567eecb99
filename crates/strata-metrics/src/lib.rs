//! strata-metrics — per-tier utilization snapshots.
//!
//! Wraps an injected transport capability ([`MetricsBackend`]) with the
//! snapshot semantics the control loop relies on: a hard per-call
//! deadline, tier-stamped node snapshots, and partial results that name
//! the unreachable nodes instead of failing the tier outright.
//!
//! # Components
//!
//! - **`source`** — `MetricsSource`, the backend trait, and the
//!   in-memory `StaticBackend`
//! - **`http`** — `HttpBackend` for the cluster's HTTP metrics API

pub mod http;
pub mod source;

pub use http::HttpBackend;
pub use source::{MetricsBackend, MetricsError, MetricsSource, NodeReading, StaticBackend, TierReadings};
