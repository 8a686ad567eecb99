//! Control loop — ties observation, decision, placement, and dispatch
//! together.
//!
//! One timer drives all tiers: each tick runs every tier through the
//! cycle `poll → gate → snapshot → decide → plan → submit`. Tiers are
//! independent; a tier that fails (metrics outage, infeasible
//! placement, executor refusal) only affects itself, and every
//! suspension point is timeout-bounded so a stalled tier cannot hold
//! up the rest of the tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use strata_autoscale::{decide, gate, ScaleAction, SkipReason};
use strata_core::{NodeSnapshot, OperationKind, Settings, TierName, TierPolicy, TierRegistry};
use strata_dispatch::{DispatchError, ExecutorRequest, JobDispatcher};
use strata_metrics::MetricsSource;
use strata_placement::{plan_provision, select_decommission};

type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Optional collaborator: confirms that a provisioned node has settled
/// into the cluster. Until it has, the node is not a decommission
/// candidate. When no implementation is wired, every node is
/// immediately eligible.
pub trait NodeHealth: Send + Sync {
    fn is_established<'a>(&'a self, tier: &'a str, node: &'a str) -> BoxFuture<'a, bool>;
}

/// How one tier's cycle ended this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Short-circuited before deciding (in-flight or cooldown).
    Skipped(SkipReason),
    /// Metrics were unavailable; retried next tick.
    NoSnapshot,
    NoAction,
    /// Placement found no valid selection (zone floors).
    Infeasible,
    Dispatched { kind: OperationKind, count: u32 },
    DispatchFailed,
}

/// The autoscaling control loop.
pub struct ControlLoop {
    settings: Settings,
    metrics: MetricsSource,
    dispatcher: JobDispatcher,
    registry: Arc<TierRegistry>,
    node_health: Option<Arc<dyn NodeHealth>>,
}

impl ControlLoop {
    pub fn new(
        settings: Settings,
        metrics: MetricsSource,
        dispatcher: JobDispatcher,
        registry: Arc<TierRegistry>,
    ) -> Self {
        Self {
            settings,
            metrics,
            dispatcher,
            registry,
            node_health: None,
        }
    }

    /// Wire the optional node-health confirmation collaborator.
    pub fn with_node_health(mut self, health: Arc<dyn NodeHealth>) -> Self {
        self.node_health = Some(health);
        self
    }

    /// Run one cycle for a single tier.
    pub async fn tick_tier(&self, policy: &TierPolicy) -> CycleOutcome {
        let tier = policy.tier.as_str();

        // Resolve any pending operation first: a confirmation or
        // failure observed now frees (or cools down) the tier for the
        // gate check below.
        if let Err(e) = self.dispatcher.poll(tier).await {
            debug!(tier, error = %e, "poll failed");
        }

        let Some(slot) = self.registry.get(tier) else {
            warn!(tier, "tier missing from registry");
            return CycleOutcome::NoAction;
        };
        let skip = {
            let state = slot.lock().await;
            gate(&state, policy.cooldown, epoch_secs())
        };
        if let Some(reason) = skip {
            debug!(tier, ?reason, "cycle short-circuited");
            return CycleOutcome::Skipped(reason);
        }

        let snapshot = match self.metrics.snapshot(tier).await {
            Ok(s) => s,
            Err(e) => {
                warn!(tier, error = %e, "skipping tier this cycle");
                return CycleOutcome::NoSnapshot;
            }
        };

        match decide(policy, &snapshot, self.settings.max_unreachable_fraction) {
            ScaleAction::NoAction => CycleOutcome::NoAction,

            ScaleAction::Provision { count } => {
                let targets = plan_provision(&snapshot, policy, count);
                let mut parameters = BTreeMap::new();
                for target in &targets {
                    parameters.insert(format!("zone.{}", target.name), target.zone.clone());
                }
                let req = ExecutorRequest {
                    kind: OperationKind::Provision,
                    tier: policy.tier.clone(),
                    target_nodes: targets.into_iter().map(|t| t.name).collect(),
                    parameters,
                };
                self.dispatch(req).await
            }

            ScaleAction::Decommission { count } => {
                let mut candidates: Vec<NodeSnapshot> = snapshot
                    .nodes
                    .iter()
                    .filter(|n| n.disk_used_percent < policy.down_threshold_percent)
                    .cloned()
                    .collect();

                if let Some(health) = &self.node_health {
                    let mut established = Vec::with_capacity(candidates.len());
                    for candidate in candidates {
                        if health.is_established(tier, &candidate.name).await {
                            established.push(candidate);
                        } else {
                            debug!(tier, node = %candidate.name, "not yet established, excluded from drain");
                        }
                    }
                    candidates = established;
                }

                let plan = select_decommission(&snapshot, &candidates, count, policy);
                if plan.nodes.is_empty() {
                    warn!(tier, requested = count, "no feasible decommission selection");
                    return CycleOutcome::Infeasible;
                }

                let req = ExecutorRequest {
                    kind: OperationKind::Decommission,
                    tier: policy.tier.clone(),
                    target_nodes: plan.nodes,
                    parameters: BTreeMap::new(),
                };
                self.dispatch(req).await
            }
        }
    }

    async fn dispatch(&self, req: ExecutorRequest) -> CycleOutcome {
        let kind = req.kind;
        let count = req.target_nodes.len() as u32;
        let tier = req.tier.clone();

        match self.dispatcher.submit(req).await {
            Ok(record) => {
                info!(
                    %tier,
                    %kind,
                    count,
                    status = ?record.status,
                    "operation dispatched"
                );
                CycleOutcome::Dispatched { kind, count }
            }
            Err(DispatchError::OperationInProgress(_)) => {
                debug!(%tier, "lost submission race, operation already in flight");
                CycleOutcome::Skipped(SkipReason::InFlight)
            }
            Err(e) => {
                warn!(%tier, %kind, error = %e, "dispatch failed");
                CycleOutcome::DispatchFailed
            }
        }
    }

    /// Run one tick: every tier, in configuration order.
    pub async fn tick(&self) -> Vec<(TierName, CycleOutcome)> {
        let mut outcomes = Vec::with_capacity(self.settings.tiers.len());
        for policy in &self.settings.tiers {
            let outcome = self.tick_tier(policy).await;
            outcomes.push((policy.tier.clone(), outcome));
        }
        outcomes
    }

    /// Run the control loop until the shutdown signal fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            tiers = self.settings.tiers.len(),
            dry_run = self.settings.dry_run,
            "control loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {
                    let outcomes = self.tick().await;
                    for (tier, outcome) in &outcomes {
                        debug!(%tier, ?outcome, "tick complete");
                    }
                }
                _ = shutdown.changed() => {
                    info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use strata_core::{OperationRecord, OperationStatus};
    use strata_dispatch::{Executor, ExecutorStatus};
    use strata_metrics::{NodeReading, StaticBackend, TierReadings};

    fn policy(name: &str) -> TierPolicy {
        TierPolicy {
            tier: name.to_string(),
            node_prefix: format!("{name}-"),
            zones: vec!["z1".to_string(), "z2".to_string(), "z3".to_string()],
            down_threshold_percent: 55.0,
            down_trigger_count: 6,
            decommission_count: 2,
            up_threshold_percent: 80.0,
            headroom_min_count: 6,
            provision_count: 2,
            cooldown: Duration::from_secs(900),
            min_per_zone: 1,
        }
    }

    fn settings(tiers: Vec<TierPolicy>) -> Settings {
        Settings {
            poll_interval: Duration::from_millis(10),
            dry_run: false,
            max_unreachable_fraction: 0.3,
            metrics_timeout: Duration::from_secs(1),
            submit_timeout: Duration::from_secs(1),
            operation_timeout: Duration::from_secs(900),
            zones: vec!["z1".to_string(), "z2".to_string(), "z3".to_string()],
            tiers,
        }
    }

    fn reading(name: &str, zone: &str, disk: f64) -> NodeReading {
        NodeReading {
            name: name.to_string(),
            zone: zone.to_string(),
            disk_used_percent: disk,
        }
    }

    /// Ten hot nodes: z1 holds four, seven sit below 55%.
    fn drainable_tier() -> TierReadings {
        TierReadings {
            nodes: vec![
                reading("hot-1", "z1", 40.0),
                reading("hot-2", "z1", 42.0),
                reading("hot-3", "z1", 45.0),
                reading("hot-4", "z1", 48.0),
                reading("hot-5", "z2", 50.0),
                reading("hot-6", "z2", 52.0),
                reading("hot-7", "z2", 54.0),
                reading("hot-8", "z3", 70.0),
                reading("hot-9", "z3", 72.0),
                reading("hot-10", "z3", 75.0),
            ],
            unreachable: vec![],
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        submitted: Mutex<Vec<ExecutorRequest>>,
        status: Mutex<Option<ExecutorStatus>>,
    }

    impl RecordingExecutor {
        fn submitted(&self) -> Vec<ExecutorRequest> {
            self.submitted.lock().unwrap().clone()
        }

        fn set_status(&self, status: ExecutorStatus) {
            *self.status.lock().unwrap() = Some(status);
        }
    }

    impl Executor for RecordingExecutor {
        fn submit<'a>(
            &'a self,
            req: &'a ExecutorRequest,
        ) -> BoxFuture<'a, anyhow::Result<String>> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(req.clone());
            let id = format!("op-{}", submitted.len());
            Box::pin(async move { Ok(id) })
        }

        fn check<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, anyhow::Result<ExecutorStatus>> {
            let status = self.status.lock().unwrap().unwrap_or(ExecutorStatus::Running);
            Box::pin(async move { Ok(status) })
        }
    }

    struct Harness {
        control: ControlLoop,
        executor: Arc<RecordingExecutor>,
        backend: Arc<StaticBackend>,
        registry: Arc<TierRegistry>,
    }

    fn harness(tiers: Vec<TierPolicy>) -> Harness {
        let settings = settings(tiers);
        let backend = Arc::new(StaticBackend::new());
        let executor = Arc::new(RecordingExecutor::default());
        let registry = Arc::new(TierRegistry::from_policies(&settings.tiers));
        let metrics = MetricsSource::new(backend.clone(), settings.metrics_timeout);
        let dispatcher = JobDispatcher::new(executor.clone(), registry.clone())
            .with_submit_timeout(settings.submit_timeout)
            .with_operation_timeout(settings.operation_timeout);
        let control = ControlLoop::new(settings, metrics, dispatcher, registry.clone());
        Harness {
            control,
            executor,
            backend,
            registry,
        }
    }

    #[tokio::test]
    async fn drain_cycle_dispatches_zone_balanced_targets() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());

        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                kind: OperationKind::Decommission,
                count: 2
            }
        );

        let submitted = h.executor.submitted();
        assert_eq!(submitted.len(), 1);
        // z1 is the most populated zone; hot-4 is its highest index.
        // After that every zone ties and hot-7 is the highest eligible.
        assert_eq!(submitted[0].target_nodes, vec!["hot-4", "hot-7"]);
    }

    #[tokio::test]
    async fn provision_cycle_names_new_nodes_and_zones() {
        let h = harness(vec![policy("hot")]);
        // Only four nodes have headroom (< 80%), minimum is six.
        h.backend.set_tier(
            "hot",
            TierReadings {
                nodes: vec![
                    reading("hot-1", "z1", 70.0),
                    reading("hot-2", "z1", 72.0),
                    reading("hot-3", "z1", 75.0),
                    reading("hot-4", "z2", 78.0),
                    reading("hot-5", "z2", 85.0),
                    reading("hot-6", "z2", 88.0),
                    reading("hot-7", "z3", 90.0),
                    reading("hot-8", "z3", 92.0),
                    reading("hot-9", "z3", 95.0),
                    reading("hot-10", "z3", 97.0),
                ],
                unreachable: vec![],
            },
        );

        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                kind: OperationKind::Provision,
                count: 2
            }
        );

        let submitted = h.executor.submitted();
        assert_eq!(submitted[0].target_nodes, vec!["hot-11", "hot-12"]);
        // Zone parameters carry the placement; z1 and z2 hold three
        // nodes each against z3's four, so both targets rebalance there.
        assert_eq!(
            submitted[0].parameters.get("zone.hot-11"),
            Some(&"z1".to_string())
        );
        assert_eq!(
            submitted[0].parameters.get("zone.hot-12"),
            Some(&"z2".to_string())
        );
    }

    #[tokio::test]
    async fn pending_operation_short_circuits_the_cycle() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());

        // An ambiguous submission is still pending; the executor cannot
        // be asked about it.
        let slot = h.registry.get("hot").unwrap();
        slot.lock().await.in_flight = Some(OperationRecord {
            kind: OperationKind::Decommission,
            tier: "hot".to_string(),
            target_nodes: vec!["hot-4".to_string()],
            correlation_id: None,
            submitted_at: epoch_secs(),
            status: OperationStatus::Pending,
        });

        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::InFlight));
        assert!(h.executor.submitted().is_empty());
    }

    #[tokio::test]
    async fn confirmation_flows_into_cooldown_within_one_tick() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());

        let slot = h.registry.get("hot").unwrap();
        slot.lock().await.in_flight = Some(OperationRecord {
            kind: OperationKind::Decommission,
            tier: "hot".to_string(),
            target_nodes: vec!["hot-4".to_string()],
            correlation_id: Some("op-9".to_string()),
            submitted_at: epoch_secs(),
            status: OperationStatus::Pending,
        });
        h.executor.set_status(ExecutorStatus::Succeeded);

        // The tick's poll confirms the operation, which starts the
        // cooldown; the same tick then skips on it.
        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::Cooldown));

        let state = slot.lock().await;
        assert!(state.in_flight.is_none());
        assert!(state.last_action_at.is_some());
    }

    #[tokio::test]
    async fn cooldown_short_circuits_the_cycle() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());

        let slot = h.registry.get("hot").unwrap();
        slot.lock().await.last_action_at = Some(epoch_secs());

        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::Cooldown));
        assert!(h.executor.submitted().is_empty());
    }

    #[tokio::test]
    async fn metrics_outage_skips_only_the_failing_tier() {
        let h = harness(vec![policy("hot"), policy("cold")]);
        // Only cold has readings; hot's query fails.
        h.backend.set_tier(
            "cold",
            TierReadings {
                nodes: vec![
                    reading("cold-1", "z1", 60.0),
                    reading("cold-2", "z2", 62.0),
                    reading("cold-3", "z3", 65.0),
                    reading("cold-4", "z1", 68.0),
                    reading("cold-5", "z2", 70.0),
                    reading("cold-6", "z3", 72.0),
                ],
                unreachable: vec![],
            },
        );

        let outcomes = h.control.tick().await;
        assert_eq!(outcomes[0], ("hot".to_string(), CycleOutcome::NoSnapshot));
        assert_eq!(outcomes[1], ("cold".to_string(), CycleOutcome::NoAction));
    }

    #[tokio::test]
    async fn unreachable_majority_takes_no_action() {
        let h = harness(vec![policy("hot")]);
        let mut readings = TierReadings {
            nodes: vec![
                reading("hot-1", "z1", 40.0),
                reading("hot-2", "z1", 42.0),
                reading("hot-3", "z2", 45.0),
                reading("hot-4", "z2", 48.0),
                reading("hot-5", "z3", 50.0),
                reading("hot-6", "z3", 52.0),
                reading("hot-7", "z1", 54.0),
            ],
            unreachable: vec![],
        };
        readings.unreachable =
            vec!["hot-8".to_string(), "hot-9".to_string(), "hot-10".to_string()];
        h.backend.set_tier("hot", readings);

        let outcome = h.control.tick_tier(&policy("hot")).await;
        assert_eq!(outcome, CycleOutcome::NoAction);
        assert!(h.executor.submitted().is_empty());
    }

    #[tokio::test]
    async fn zone_floors_make_drain_infeasible() {
        let h = harness(vec![policy("hot")]);
        let mut p = policy("hot");
        p.down_trigger_count = 3;
        h.backend.set_tier(
            "hot",
            TierReadings {
                nodes: vec![
                    reading("hot-1", "z1", 40.0),
                    reading("hot-2", "z2", 42.0),
                    reading("hot-3", "z3", 45.0),
                ],
                unreachable: vec![],
            },
        );

        let outcome = h.control.tick_tier(&p).await;
        assert_eq!(outcome, CycleOutcome::Infeasible);
        assert!(h.executor.submitted().is_empty());
    }

    struct RejectNewest;

    impl NodeHealth for RejectNewest {
        fn is_established<'a>(&'a self, _tier: &'a str, node: &'a str) -> BoxFuture<'a, bool> {
            let established = node != "hot-4";
            Box::pin(async move { established })
        }
    }

    #[tokio::test]
    async fn unestablished_nodes_are_not_drain_candidates() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());
        let control = h.control.with_node_health(Arc::new(RejectNewest));

        control.tick_tier(&policy("hot")).await;

        let submitted = h.executor.submitted();
        // hot-4 would have been the first pick; with it unestablished,
        // selection falls to the next-highest in z1, then hot-7.
        assert_eq!(submitted[0].target_nodes, vec!["hot-3", "hot-7"]);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let h = harness(vec![policy("hot")]);
        h.backend.set_tier("hot", drainable_tier());

        let control = Arc::new(h.control);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = {
            let control = control.clone();
            tokio::spawn(async move { control.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}
