//! Placement planner — which nodes move, and where new ones land.
//!
//! Given a tier snapshot, the planner resolves a decider action into
//! concrete node names:
//!
//! - **Drain**: pick removal victims from the most-populated zone
//!   first, numerically highest node index on ties, without taking any
//!   zone below its floor.
//! - **Provision**: assign the lowest unused node indices for the
//!   tier's prefix and spread the new nodes round-robin, weighted
//!   toward the emptiest zones.
//!
//! Both paths are pure functions: identical inputs produce identical
//! plans.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use strata_core::{NodeName, NodeSnapshot, TierPolicy, TierSnapshot, ZoneId};

/// Result of a drain selection.
///
/// `shortfall` counts requested removals that the zone floor made
/// impossible; a non-zero shortfall is a logged deviation, not an
/// error. An empty selection means no valid victim exists at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainPlan {
    pub nodes: Vec<NodeName>,
    pub shortfall: u32,
}

impl DrainPlan {
    /// No victim could be selected without violating a zone floor.
    pub fn is_infeasible(&self) -> bool {
        self.nodes.is_empty() && self.shortfall > 0
    }
}

/// A node to be provisioned: its name and target zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionTarget {
    pub name: NodeName,
    pub zone: ZoneId,
}

/// Parse the numeric index out of a node name, e.g. `hot-12` → 12 for
/// prefix `hot-`. Names that don't match the prefix-plus-integer shape
/// yield `None` and are ignored for numbering.
pub fn node_index(name: &str, prefix: &str) -> Option<u64> {
    name.strip_prefix(prefix)?.parse().ok()
}

/// Select up to `count` victims for decommissioning.
///
/// `candidates` are the eligible nodes (below the down threshold,
/// reachable, health-established); the zone census is taken over every
/// reachable node in the snapshot. Selection repeatedly removes from
/// the zone currently holding the most nodes, breaking ties toward the
/// numerically highest node index, and never drains a zone below
/// `min_per_zone`.
pub fn select_decommission(
    snapshot: &TierSnapshot,
    candidates: &[NodeSnapshot],
    count: u32,
    policy: &TierPolicy,
) -> DrainPlan {
    let mut census: HashMap<&str, u32> = HashMap::new();
    for node in &snapshot.nodes {
        *census.entry(node.zone.as_str()).or_insert(0) += 1;
    }

    let mut remaining: Vec<&NodeSnapshot> = candidates.iter().collect();
    let mut selected = Vec::new();

    while (selected.len() as u32) < count {
        let pick = remaining
            .iter()
            .enumerate()
            .filter(|(_, c)| census.get(c.zone.as_str()).copied().unwrap_or(0) > policy.min_per_zone)
            .max_by_key(|(_, c)| {
                (
                    census.get(c.zone.as_str()).copied().unwrap_or(0),
                    node_index(&c.name, &policy.node_prefix),
                    c.name.clone(),
                )
            })
            .map(|(i, _)| i);

        let Some(i) = pick else { break };
        let victim = remaining.remove(i);
        if let Some(n) = census.get_mut(victim.zone.as_str()) {
            *n -= 1;
        }
        debug!(
            tier = %policy.tier,
            node = %victim.name,
            zone = %victim.zone,
            "selected for decommission"
        );
        selected.push(victim.name.clone());
    }

    let shortfall = count - selected.len() as u32;
    if shortfall > 0 {
        warn!(
            tier = %policy.tier,
            requested = count,
            selected = selected.len(),
            min_per_zone = policy.min_per_zone,
            "zone floor limited drain selection"
        );
    }

    DrainPlan {
        nodes: selected,
        shortfall,
    }
}

/// Plan names and target zones for `count` new nodes.
///
/// Names take the lowest unused indices for the tier prefix, counting
/// unreachable nodes as occupied so their names are never reused.
/// Zones are assigned one node at a time to the policy zone with the
/// fewest (current + planned) nodes; ties follow the policy's zone
/// order.
pub fn plan_provision(
    snapshot: &TierSnapshot,
    policy: &TierPolicy,
    count: u32,
) -> Vec<ProvisionTarget> {
    let used: BTreeSet<u64> = snapshot
        .nodes
        .iter()
        .map(|n| n.name.as_str())
        .chain(snapshot.unreachable.iter().map(String::as_str))
        .filter_map(|name| node_index(name, &policy.node_prefix))
        .collect();

    let mut census: HashMap<&str, u32> = policy.zones.iter().map(|z| (z.as_str(), 0)).collect();
    for node in &snapshot.nodes {
        if let Some(n) = census.get_mut(node.zone.as_str()) {
            *n += 1;
        }
    }

    let mut targets = Vec::with_capacity(count as usize);
    let mut next_index = 1u64;

    for _ in 0..count {
        while used.contains(&next_index) {
            next_index += 1;
        }
        let name = format!("{}{}", policy.node_prefix, next_index);
        next_index += 1;

        // min_by_key keeps the first of equal minima, so ties follow
        // the configured zone order.
        let Some(zone) = policy
            .zones
            .iter()
            .min_by_key(|z| census.get(z.as_str()).copied().unwrap_or(0))
            .cloned()
        else {
            break;
        };
        if let Some(n) = census.get_mut(zone.as_str()) {
            *n += 1;
        }

        debug!(tier = %policy.tier, node = %name, zone = %zone, "planned provision target");
        targets.push(ProvisionTarget { name, zone });
    }

    targets
}
