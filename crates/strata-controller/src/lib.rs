//! strata-controller — the autoscaling control loop.
//!
//! Each tick walks every configured tier through one cycle:
//!
//! ```text
//! poll in-flight → hysteresis gate → snapshot → decide → plan → submit
//! ```
//!
//! The cycle short-circuits on a pending operation or an open cooldown
//! window, and each tier's outcome is independent: metrics outages,
//! infeasible placements, and executor refusals stop that tier for one
//! tick and nothing else. Shutdown is a watch signal; no cycle state
//! survives outside the tier registry.

pub mod controller;

pub use controller::{ControlLoop, CycleOutcome, NodeHealth};
