//! Domain types shared across the Strata subsystems.
//!
//! These types describe what the control loop observes (node snapshots),
//! what it decides to do (operation records), and the per-tier mutable
//! state those decisions are guarded by.

use serde::{Deserialize, Serialize};

/// Name of a capacity tier (e.g. "hot", "warm", "cold").
pub type TierName = String;

/// Name of an availability zone nodes are spread across.
pub type ZoneId = String;

/// Name of a single storage node.
pub type NodeName = String;

// ── Observations ──────────────────────────────────────────────────

/// Utilization of a single node, captured during one poll cycle.
///
/// Snapshots are immutable once captured; the next cycle produces a
/// fresh set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: NodeName,
    pub tier: TierName,
    pub zone: ZoneId,
    pub disk_used_percent: f64,
}

/// A consistent per-tier view of the cluster for one poll cycle.
///
/// `unreachable` lists nodes that could not be queried within the
/// metrics window. They are excluded from all threshold counts and
/// never qualify for decommission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSnapshot {
    pub tier: TierName,
    pub nodes: Vec<NodeSnapshot>,
    pub unreachable: Vec<NodeName>,
}

impl TierSnapshot {
    /// Total node count including unreachable ones.
    pub fn total(&self) -> usize {
        self.nodes.len() + self.unreachable.len()
    }

    /// Fraction of the tier that could not be queried this cycle.
    pub fn unreachable_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.unreachable.len() as f64 / total as f64
        }
    }

    /// Whether some nodes failed to report.
    pub fn is_partial(&self) -> bool {
        !self.unreachable.is_empty()
    }
}

// ── Operations ────────────────────────────────────────────────────

/// The two capacity mutations the loop can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Provision,
    Decommission,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Provision => write!(f, "provision"),
            OperationKind::Decommission => write!(f, "decommission"),
        }
    }
}

/// Lifecycle of a submitted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Confirmed,
    Failed,
}

/// A provision/decommission request handed to the external executor.
///
/// Created on dispatch, resolved on executor feedback or a hard
/// timeout. At most one Pending record exists per tier at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub tier: TierName,
    pub target_nodes: Vec<NodeName>,
    /// Correlation id assigned by the executor. Absent when the
    /// submission outcome was ambiguous (possibly delivered).
    pub correlation_id: Option<String>,
    /// Unix timestamp (seconds) when the request was submitted.
    pub submitted_at: u64,
    pub status: OperationStatus,
}

// ── Per-tier state ────────────────────────────────────────────────

/// Mutable control state for a single tier.
///
/// One instance per tier for the process lifetime, accessed only
/// through its registry lock.
#[derive(Debug, Clone, PartialEq)]
pub struct TierState {
    pub tier: TierName,
    /// Unix timestamp of the last confirmed action; starts the
    /// cooldown window.
    pub last_action_at: Option<u64>,
    /// The currently pending operation, if any.
    pub in_flight: Option<OperationRecord>,
    /// Most recently resolved operation, kept for observability.
    pub last_operation: Option<OperationRecord>,
}

impl TierState {
    pub fn new(tier: impl Into<TierName>) -> Self {
        Self {
            tier: tier.into(),
            last_action_at: None,
            in_flight: None,
            last_operation: None,
        }
    }

    /// Whether an operation is submitted but not yet resolved.
    pub fn has_pending(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|op| op.status == OperationStatus::Pending)
    }
}
