//! Metrics source — bounded-timeout snapshots of per-tier utilization.
//!
//! The actual transport is an injected [`MetricsBackend`] capability;
//! this module owns the snapshot semantics: one consistent view per
//! cycle, a hard per-call deadline, and partial results carrying the
//! unreachable node names rather than failing the whole tier.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use strata_core::{NodeName, NodeSnapshot, TierSnapshot, ZoneId};

type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One node's utilization as reported by the cluster API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeReading {
    pub name: NodeName,
    pub zone: ZoneId,
    pub disk_used_percent: f64,
}

/// The raw per-tier query result from a backend.
///
/// `unreachable` lists nodes the backend knows about but could not
/// query within its own window.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TierReadings {
    pub nodes: Vec<NodeReading>,
    #[serde(default)]
    pub unreachable: Vec<NodeName>,
}

/// Capability for querying per-node utilization of a tier.
///
/// Implementations block on network I/O; the [`MetricsSource`] wrapper
/// applies the deadline, so backends only need to report what they saw.
pub trait MetricsBackend: Send + Sync {
    fn query_tier<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, anyhow::Result<TierReadings>>;
}

/// Errors surfaced by [`MetricsSource::snapshot`].
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The query could not complete this cycle. Transient: the tier is
    /// skipped and retried on the next tick.
    #[error("metrics unavailable for tier {tier}: {reason}")]
    Unavailable { tier: String, reason: String },
}

/// Snapshots a tier's utilization through an injected backend.
pub struct MetricsSource {
    backend: Arc<dyn MetricsBackend>,
    timeout: Duration,
}

impl MetricsSource {
    pub fn new(backend: Arc<dyn MetricsBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Capture a consistent view of one tier.
    ///
    /// A backend error or a blown deadline yields
    /// [`MetricsError::Unavailable`]; nodes the backend could not reach
    /// are carried in the snapshot's `unreachable` list instead.
    pub async fn snapshot(&self, tier: &str) -> Result<TierSnapshot, MetricsError> {
        let readings = match tokio::time::timeout(self.timeout, self.backend.query_tier(tier)).await
        {
            Ok(Ok(readings)) => readings,
            Ok(Err(e)) => {
                return Err(MetricsError::Unavailable {
                    tier: tier.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(MetricsError::Unavailable {
                    tier: tier.to_string(),
                    reason: format!("query timed out after {:?}", self.timeout),
                });
            }
        };

        let snapshot = TierSnapshot {
            tier: tier.to_string(),
            nodes: readings
                .nodes
                .into_iter()
                .map(|r| NodeSnapshot {
                    name: r.name,
                    tier: tier.to_string(),
                    zone: r.zone,
                    disk_used_percent: r.disk_used_percent,
                })
                .collect(),
            unreachable: readings.unreachable,
        };

        if snapshot.is_partial() {
            warn!(
                tier,
                reachable = snapshot.nodes.len(),
                unreachable = snapshot.unreachable.len(),
                "partial snapshot — some nodes did not report"
            );
        } else {
            debug!(tier, nodes = snapshot.nodes.len(), "snapshot captured");
        }

        Ok(snapshot)
    }
}

/// In-memory backend serving fixed readings. Used by tests and local
/// dry runs.
#[derive(Default)]
pub struct StaticBackend {
    tiers: std::sync::Mutex<HashMap<String, TierReadings>>,
}

impl StaticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the readings served for a tier.
    pub fn set_tier(&self, tier: &str, readings: TierReadings) {
        self.tiers
            .lock()
            .unwrap()
            .insert(tier.to_string(), readings);
    }
}

impl MetricsBackend for StaticBackend {
    fn query_tier<'a>(&'a self, tier: &'a str) -> BoxFuture<'a, anyhow::Result<TierReadings>> {
        let result = self
            .tiers
            .lock()
            .unwrap()
            .get(tier)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown tier: {tier}"));
        Box::pin(async move { result })
    }
}
