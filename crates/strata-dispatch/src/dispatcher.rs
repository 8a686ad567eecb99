//! Job dispatcher — at-most-one in-flight operation per tier.
//!
//! Submissions check-and-set the tier's `in_flight` record under the
//! tier guard, which is held across the executor call so racing
//! submits cannot both get through. Polling resolves Pending records
//! from executor feedback, or fails them open once the hard operation
//! timeout passes so a lost request can never wedge a tier forever.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use strata_core::{OperationRecord, OperationStatus, TierRegistry};

use crate::error::{DispatchError, DispatchResult};
use crate::executor::{Executor, ExecutorRequest, ExecutorStatus};

/// Submits operations to the executor and tracks them per tier.
pub struct JobDispatcher {
    executor: Arc<dyn Executor>,
    registry: Arc<TierRegistry>,
    /// When set, nothing reaches the executor; submissions produce
    /// synthetic Confirmed records (cooldown still applies).
    dry_run: bool,
    submit_timeout: Duration,
    /// Pending operations older than this are failed open.
    operation_timeout: Duration,
    dry_counter: AtomicU64,
}

impl JobDispatcher {
    pub fn new(executor: Arc<dyn Executor>, registry: Arc<TierRegistry>) -> Self {
        Self {
            executor,
            registry,
            dry_run: false,
            submit_timeout: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(900),
            dry_counter: AtomicU64::new(0),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Submit an operation for a tier.
    ///
    /// Returns [`DispatchError::OperationInProgress`] if the tier
    /// already has a Pending record; otherwise the new record, which is
    /// Pending (or Confirmed in dry-run mode).
    pub async fn submit(&self, req: ExecutorRequest) -> DispatchResult<OperationRecord> {
        let slot = self
            .registry
            .get(&req.tier)
            .ok_or_else(|| DispatchError::UnknownTier(req.tier.clone()))?;

        // The guard stays held across the executor call: check-and-set
        // must be atomic with recording the outcome.
        let mut state = slot.lock().await;

        if state.has_pending() {
            debug!(tier = %req.tier, "submission rejected, operation already in flight");
            return Err(DispatchError::OperationInProgress(req.tier.clone()));
        }

        let now = epoch_secs();

        if self.dry_run {
            let id = format!("dry-{}", self.dry_counter.fetch_add(1, Ordering::Relaxed) + 1);
            let record = OperationRecord {
                kind: req.kind,
                tier: req.tier.clone(),
                target_nodes: req.target_nodes.clone(),
                correlation_id: Some(id),
                submitted_at: now,
                status: OperationStatus::Confirmed,
            };
            state.last_action_at = Some(now);
            state.last_operation = Some(record.clone());
            info!(
                tier = %req.tier,
                kind = %req.kind,
                targets = ?req.target_nodes,
                "dry run: operation logged, not submitted"
            );
            return Ok(record);
        }

        match tokio::time::timeout(self.submit_timeout, self.executor.submit(&req)).await {
            Ok(Ok(correlation_id)) => {
                let record = OperationRecord {
                    kind: req.kind,
                    tier: req.tier.clone(),
                    target_nodes: req.target_nodes.clone(),
                    correlation_id: Some(correlation_id.clone()),
                    submitted_at: now,
                    status: OperationStatus::Pending,
                };
                state.in_flight = Some(record.clone());
                info!(
                    tier = %req.tier,
                    kind = %req.kind,
                    id = %correlation_id,
                    targets = ?req.target_nodes,
                    "operation submitted"
                );
                Ok(record)
            }
            Ok(Err(e)) => {
                // The executor reported the request was never delivered;
                // the tier stays free.
                warn!(tier = %req.tier, error = %e, "submission failed");
                Err(DispatchError::SubmitFailed {
                    tier: req.tier.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                // Timed out mid-submit: the request may have been
                // delivered. Record it Pending without a correlation id;
                // only the hard operation timeout can resolve it.
                let record = OperationRecord {
                    kind: req.kind,
                    tier: req.tier.clone(),
                    target_nodes: req.target_nodes.clone(),
                    correlation_id: None,
                    submitted_at: now,
                    status: OperationStatus::Pending,
                };
                state.in_flight = Some(record.clone());
                warn!(
                    tier = %req.tier,
                    kind = %req.kind,
                    "submission timed out, outcome ambiguous — holding tier pending"
                );
                Ok(record)
            }
        }
    }

    /// Resolve the tier's in-flight operation, if any.
    ///
    /// Returns the record's status after resolution: `Pending` while
    /// the executor still reports it running, `Confirmed`/`Failed` once
    /// resolved, `None` when nothing is in flight. Confirmation updates
    /// `last_action_at`, starting the cooldown window.
    pub async fn poll(&self, tier: &str) -> DispatchResult<Option<OperationStatus>> {
        let slot = self
            .registry
            .get(tier)
            .ok_or_else(|| DispatchError::UnknownTier(tier.to_string()))?;
        let mut state = slot.lock().await;

        let Some(op) = state.in_flight.clone() else {
            return Ok(None);
        };

        let now = epoch_secs();
        let mut outcome = None;

        if let Some(id) = &op.correlation_id {
            match tokio::time::timeout(self.submit_timeout, self.executor.check(id)).await {
                Ok(Ok(ExecutorStatus::Succeeded)) => outcome = Some(OperationStatus::Confirmed),
                Ok(Ok(ExecutorStatus::Failed)) => {
                    warn!(tier, id = %id, "executor reported operation failed");
                    outcome = Some(OperationStatus::Failed);
                }
                Ok(Ok(ExecutorStatus::Running)) => {}
                Ok(Err(e)) => debug!(tier, id = %id, error = %e, "status check failed"),
                Err(_) => debug!(tier, id = %id, "status check timed out"),
            }
        }

        if outcome.is_none() && now.saturating_sub(op.submitted_at) >= self.operation_timeout.as_secs()
        {
            // True external state is unknown; release the tier so the
            // loop is never permanently stuck, but make noise.
            warn!(
                tier,
                kind = %op.kind,
                age_secs = now.saturating_sub(op.submitted_at),
                "operation timed out — marking failed, operator attention required"
            );
            outcome = Some(OperationStatus::Failed);
        }

        match outcome {
            Some(OperationStatus::Confirmed) => {
                let mut record = op;
                record.status = OperationStatus::Confirmed;
                state.last_action_at = Some(now);
                state.last_operation = Some(record);
                state.in_flight = None;
                info!(tier, "operation confirmed, cooldown started");
                Ok(Some(OperationStatus::Confirmed))
            }
            Some(OperationStatus::Failed) => {
                let mut record = op;
                record.status = OperationStatus::Failed;
                state.last_operation = Some(record);
                state.in_flight = None;
                Ok(Some(OperationStatus::Failed))
            }
            _ => Ok(Some(OperationStatus::Pending)),
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
