//! strata-autoscale — the scaling decision engine.
//!
//! A pure threshold evaluator ([`decide`]) plus the hysteresis gate
//! ([`gate`]) that keeps a tier quiet while an operation is in flight
//! or its cooldown window is open. The decider only says *how many*
//! nodes move; choosing *which* nodes is placement's job.

pub mod decider;

pub use decider::{decide, gate, ScaleAction, SkipReason};
