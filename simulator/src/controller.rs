//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{info, warn};

use pointledger_common::{PointError, UserId};
use pointledger_ledger::history::net_change;
use pointledger_server::{PointService, ServiceConfig};

use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, BurstOp, Scenario, ScenarioStep};

/// A single concrete service call.
#[derive(Debug, Clone, Copy)]
enum Operation {
    Charge,
    Use,
    Read,
}

impl Operation {
    /// Operation run by the `index`-th task of a burst.
    fn for_burst(op: BurstOp, index: usize) -> Self {
        match op {
            BurstOp::Charge => Operation::Charge,
            BurstOp::Use => Operation::Use,
            BurstOp::Read => Operation::Read,
            BurstOp::Mixed => [Operation::Charge, Operation::Use, Operation::Read][index % 3],
        }
    }
}

/// Drives scenarios against an in-process point service.
pub struct SimulationController {
    /// Service under test.
    service: Arc<PointService>,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Duration of the last executed step.
    last_step: RwLock<Duration>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(config: &ServiceConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            service: Arc::new(PointService::in_memory(config)),
            rng: Arc::new(RwLock::new(rng)),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            last_step: RwLock::new(Duration::ZERO),
        }
    }

    /// Service under test.
    pub fn service(&self) -> &Arc<PointService> {
        &self.service
    }

    /// Run a scenario, failing on the first violated assertion.
    pub async fn run_scenario(&self, scenario: &Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        for step in &scenario.steps {
            let started = Instant::now();
            self.execute_step(step).await?;
            if !matches!(step, ScenarioStep::Assert { .. }) {
                *self.last_step.write().await = started.elapsed();
            }
        }

        Ok(())
    }

    async fn record(metrics: &RwLock<SimulationMetrics>, started: Instant, result: Result<(), PointError>) {
        let latency_us = started.elapsed().as_micros() as u64;
        let mut metrics = metrics.write().await;
        match result {
            Ok(()) => metrics.record_success(latency_us),
            Err(e) if e.is_rejection() => metrics.record_rejection(latency_us),
            Err(e) => {
                warn!(error = %e, "Operation failed");
                metrics.record_failure();
            }
        }
    }

    async fn run_op(
        service: Arc<PointService>,
        metrics: Arc<RwLock<SimulationMetrics>>,
        user: UserId,
        op: Operation,
        amount: i64,
    ) {
        let started = Instant::now();
        let result = match op {
            Operation::Charge => service.charge_point(user, amount).await.map(|_| ()),
            Operation::Use => service.use_point(user, amount).await.map(|_| ()),
            Operation::Read => service.get_user_point(user).await.map(|_| ()),
        };
        Self::record(&metrics, started, result).await;
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Wait { millis } => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            ScenarioStep::Charge { user, amount } => {
                Self::run_op(
                    self.service.clone(),
                    self.metrics.clone(),
                    UserId::new(*user),
                    Operation::Charge,
                    *amount,
                )
                .await;
            }
            ScenarioStep::Use { user, amount } => {
                Self::run_op(
                    self.service.clone(),
                    self.metrics.clone(),
                    UserId::new(*user),
                    Operation::Use,
                    *amount,
                )
                .await;
            }
            ScenarioStep::Burst {
                users,
                tasks,
                op,
                amount,
            } => {
                info!(users = ?users, tasks, op = ?op, amount, "Starting burst");
                let handles: Vec<_> = users
                    .iter()
                    .flat_map(|&user| (0..*tasks).map(move |i| (UserId::new(user), i)))
                    .map(|(user, i)| {
                        tokio::spawn(Self::run_op(
                            self.service.clone(),
                            self.metrics.clone(),
                            user,
                            Operation::for_burst(*op, i),
                            *amount,
                        ))
                    })
                    .collect();

                for result in join_all(handles).await {
                    result?;
                }
            }
            ScenarioStep::RandomLoad {
                users,
                operations,
                max_amount,
            } => {
                anyhow::ensure!(
                    *users >= 1 && *max_amount >= 1,
                    "random load needs at least one user and a positive max amount"
                );
                info!(users, operations, "Starting random load");
                let ops: Vec<(UserId, Operation, i64)> = {
                    let mut rng = self.rng.write().await;
                    (0..*operations)
                        .map(|_| {
                            let user = UserId::new(rng.gen_range(1..=*users));
                            let op = if rng.gen_bool(0.6) {
                                Operation::Charge
                            } else {
                                Operation::Use
                            };
                            (user, op, rng.gen_range(1..=*max_amount))
                        })
                        .collect()
                };

                let handles: Vec<_> = ops
                    .into_iter()
                    .map(|(user, op, amount)| {
                        tokio::spawn(Self::run_op(
                            self.service.clone(),
                            self.metrics.clone(),
                            user,
                            op,
                            amount,
                        ))
                    })
                    .collect();

                for result in join_all(handles).await {
                    result?;
                }
            }
            ScenarioStep::Assert { condition } => self.check(condition).await?,
        }

        Ok(())
    }

    async fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        match condition {
            AssertCondition::BalanceEquals { user, point } => {
                let actual = self.service.get_user_point(UserId::new(*user)).await?.point;
                anyhow::ensure!(
                    actual == *point,
                    "user {} balance is {}, expected {}",
                    user,
                    actual,
                    point
                );
            }
            AssertCondition::HistoryLength { user, len } => {
                let actual = self.service.get_point_history(UserId::new(*user)).await?.len();
                anyhow::ensure!(
                    actual == *len,
                    "user {} has {} history records, expected {}",
                    user,
                    actual,
                    len
                );
            }
            AssertCondition::ElapsedBelow { millis } => {
                let elapsed = *self.last_step.read().await;
                anyhow::ensure!(
                    elapsed < Duration::from_millis(*millis),
                    "previous step took {:?}, limit {}ms",
                    elapsed,
                    millis
                );
            }
            AssertCondition::Reconciled { users } => {
                for user in 1..=*users {
                    let id = UserId::new(user);
                    let balance = self.service.get_user_point(id).await?.point;
                    let history = self.service.get_point_history(id).await?;
                    anyhow::ensure!(
                        balance as i128 == net_change(&history),
                        "user {} balance {} disagrees with history net {}",
                        user,
                        balance,
                        net_change(&history)
                    );
                }
            }
        }
        info!(condition = ?condition, "Assertion passed");
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_builtin_scenarios_pass() {
        for name in Scenario::builtin_names() {
            let controller = SimulationController::new(&ServiceConfig::default(), Some(7));
            let scenario = Scenario::load(name).unwrap();
            controller.run_scenario(&scenario).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_failed_assertion_is_reported() {
        let controller = SimulationController::new(&ServiceConfig::default(), Some(1));
        let scenario = Scenario {
            name: "broken".to_string(),
            description: "expects a balance that was never charged".to_string(),
            steps: vec![ScenarioStep::Assert {
                condition: AssertCondition::BalanceEquals { user: 1, point: 5 },
            }],
        };

        assert!(controller.run_scenario(&scenario).await.is_err());
    }

    #[tokio::test]
    async fn test_drain_counts_rejections() {
        let controller = SimulationController::new(&ServiceConfig::default(), None);
        controller
            .run_scenario(&Scenario::load("drain").unwrap())
            .await
            .unwrap();

        let metrics = controller.get_metrics().await;
        assert_eq!(metrics.total_operations, 16);
        assert_eq!(metrics.rejected_operations, 5);
        assert_eq!(metrics.failed_operations, 0);
    }
}
