//! Scaling decider — maps a tier snapshot to a scaling action.
//!
//! [`decide`] is a pure function over the snapshot and policy; the same
//! inputs always produce the same action. Which concrete nodes move is
//! the placement planner's job, not the decider's.
//!
//! # Decision rules
//!
//! ```text
//! headroom = reachable nodes with disk < up_threshold_percent
//! if headroom < headroom_min_count:
//!     Provision { provision_count }          // checked first
//!
//! below = reachable nodes with disk < down_threshold_percent
//! if below >= down_trigger_count:
//!     Decommission { min(decommission_count, below) }
//! ```
//!
//! Provision is evaluated before Decommission, so when disjoint
//! threshold bands make both conditions true, capacity is added rather
//! than removed. Unreachable nodes are excluded from both counts; a
//! tier with too many unreachable nodes is skipped entirely for the
//! cycle.

use std::time::Duration;

use tracing::{debug, warn};

use strata_core::{TierPolicy, TierSnapshot, TierState};

/// The action to take for a tier this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    NoAction,
    Provision { count: u32 },
    Decommission { count: u32 },
}

/// Why a tier's cycle was short-circuited before deciding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A submitted operation has not resolved yet.
    InFlight,
    /// The cooldown window since the last confirmed action is still
    /// open.
    Cooldown,
}

/// Decide the scaling action for one tier.
///
/// Pure: no clocks, no state. Hysteresis lives in [`gate`].
pub fn decide(
    policy: &TierPolicy,
    snapshot: &TierSnapshot,
    max_unreachable_fraction: f64,
) -> ScaleAction {
    let total = snapshot.total();
    if total == 0 {
        // Nothing known about the tier; never act on no information.
        debug!(tier = %policy.tier, "empty snapshot, no action");
        return ScaleAction::NoAction;
    }

    let fraction = snapshot.unreachable_fraction();
    if fraction >= max_unreachable_fraction && !snapshot.unreachable.is_empty() {
        warn!(
            tier = %policy.tier,
            unreachable = snapshot.unreachable.len(),
            total,
            "too many unreachable nodes, skipping tier this cycle"
        );
        return ScaleAction::NoAction;
    }

    let headroom = snapshot
        .nodes
        .iter()
        .filter(|n| n.disk_used_percent < policy.up_threshold_percent)
        .count() as u32;

    // Too few nodes with headroom: disks are about to fill. Adding
    // capacity takes priority over reclaiming it.
    if headroom < policy.headroom_min_count {
        debug!(
            tier = %policy.tier,
            headroom,
            required = policy.headroom_min_count,
            count = policy.provision_count,
            "provision triggered"
        );
        return ScaleAction::Provision {
            count: policy.provision_count,
        };
    }

    let below = snapshot
        .nodes
        .iter()
        .filter(|n| n.disk_used_percent < policy.down_threshold_percent)
        .count() as u32;

    if below >= policy.down_trigger_count {
        let count = policy.decommission_count.min(below);
        debug!(
            tier = %policy.tier,
            below,
            trigger = policy.down_trigger_count,
            count,
            "decommission triggered"
        );
        return ScaleAction::Decommission { count };
    }

    ScaleAction::NoAction
}

/// Hysteresis gate: whether a tier may act at all this cycle.
///
/// A tier with a pending operation, or still inside its cooldown
/// window, is skipped regardless of threshold breaches.
pub fn gate(state: &TierState, cooldown: Duration, now: u64) -> Option<SkipReason> {
    if state.has_pending() {
        return Some(SkipReason::InFlight);
    }
    if let Some(last) = state.last_action_at
        && now < last + cooldown.as_secs()
    {
        return Some(SkipReason::Cooldown);
    }
    None
}
