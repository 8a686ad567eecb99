//! Guarded per-tier state arena.
//!
//! Each tier owns one [`TierState`] behind its own async mutex. Tiers
//! never share mutable state, so holding one tier's guard never blocks
//! another tier's cycle. The registry itself is immutable after
//! construction: the tier set comes from configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::TierPolicy;
use crate::types::{TierName, TierState};

/// Immutable map of tier name to its guarded state.
#[derive(Debug, Default)]
pub struct TierRegistry {
    tiers: HashMap<TierName, Arc<Mutex<TierState>>>,
}

impl TierRegistry {
    /// Build a registry with one state slot per configured tier.
    pub fn from_policies(policies: &[TierPolicy]) -> Self {
        let tiers = policies
            .iter()
            .map(|p| {
                (
                    p.tier.clone(),
                    Arc::new(Mutex::new(TierState::new(p.tier.clone()))),
                )
            })
            .collect();
        Self { tiers }
    }

    /// Look up the guarded state for a tier.
    pub fn get(&self, tier: &str) -> Option<Arc<Mutex<TierState>>> {
        self.tiers.get(tier).cloned()
    }

    /// Names of all registered tiers.
    pub fn tier_names(&self) -> Vec<TierName> {
        self.tiers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(name: &str) -> TierPolicy {
        TierPolicy {
            tier: name.to_string(),
            node_prefix: format!("{name}-"),
            zones: vec!["z1".to_string()],
            down_threshold_percent: 50.0,
            down_trigger_count: 3,
            decommission_count: 1,
            up_threshold_percent: 80.0,
            headroom_min_count: 2,
            provision_count: 1,
            cooldown: Duration::from_secs(600),
            min_per_zone: 1,
        }
    }

    #[tokio::test]
    async fn registry_exposes_one_slot_per_tier() {
        let registry = TierRegistry::from_policies(&[policy("hot"), policy("cold")]);

        assert_eq!(registry.tier_names().len(), 2);
        assert!(registry.get("hot").is_some());
        assert!(registry.get("lukewarm").is_none());

        let slot = registry.get("hot").unwrap();
        let state = slot.lock().await;
        assert_eq!(state.tier, "hot");
        assert!(!state.has_pending());
    }

    #[tokio::test]
    async fn slots_are_shared_not_copied() {
        let registry = TierRegistry::from_policies(&[policy("hot")]);

        {
            let slot = registry.get("hot").unwrap();
            slot.lock().await.last_action_at = Some(42);
        }
        let slot = registry.get("hot").unwrap();
        assert_eq!(slot.lock().await.last_action_at, Some(42));
    }
}
