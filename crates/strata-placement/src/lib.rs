//! strata-placement — resolves scaling actions into concrete nodes.
//!
//! The decider says "remove 2" or "add 2"; this crate says *which*
//! nodes leave (zone-balance aware, deterministic tie-breaks, zone
//! floors) and what the new ones are called and where they land
//! (gap-free numbering, weighted round-robin zones).

pub mod planner;

pub use planner::{node_index, plan_provision, select_decommission, DrainPlan, ProvisionTarget};
