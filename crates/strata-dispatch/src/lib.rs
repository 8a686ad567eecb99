//! strata-dispatch — operation submission and tracking.
//!
//! The dispatcher is the only component that talks to the external job
//! runner, through the injected [`Executor`] capability. It enforces
//! the central mutual-exclusion invariant: at most one in-flight
//! operation per tier, checked and recorded atomically under the
//! tier's guard. Pending operations resolve from executor feedback or
//! fail open on a hard timeout.
//!
//! # Components
//!
//! - **`executor`** — the capability trait, HTTP client, noop impl
//! - **`dispatcher`** — `JobDispatcher` (guard, poll, dry-run)
//! - **`error`** — dispatch error taxonomy

pub mod dispatcher;
pub mod error;
pub mod executor;

pub use dispatcher::JobDispatcher;
pub use error::{DispatchError, DispatchResult};
pub use executor::{Executor, ExecutorRequest, ExecutorStatus, HttpExecutor, NoopExecutor};
