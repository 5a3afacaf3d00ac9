//! Point service: validated, per-user serialized balance mutations.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Instrument};

use pointledger_common::{time, PointError, Result, TransactionType, UserId};
use pointledger_ledger::{
    BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore, PointHistory,
    PointValidator, UserPoint,
};

use crate::config::{ReadConsistency, ServiceConfig};
use crate::lock_manager::{UserLockGuard, UserLockManager};
use crate::metrics::{Metrics, SharedMetrics};

/// Orchestrates validation, locking and the two stores.
///
/// A mutation validates its input, takes the user's lock, re-reads the
/// balance, re-validates against that fresh value and only then writes the
/// new balance followed by one history record. The balance write and the
/// history append are not one transaction: if the append fails the balance
/// has already moved and the failure is logged and returned as `Store`.
/// Once the lock is held the remaining steps run on their own task, so a
/// caller that goes away cannot stop a mutation between the two writes.
pub struct PointService {
    balances: Arc<dyn BalanceStore>,
    histories: Arc<dyn HistoryStore>,
    validator: PointValidator,
    lock_manager: Arc<UserLockManager>,
    read_consistency: ReadConsistency,
    metrics: SharedMetrics,
}

impl PointService {
    /// Create a service over the given stores and lock manager.
    pub fn new(
        balances: Arc<dyn BalanceStore>,
        histories: Arc<dyn HistoryStore>,
        lock_manager: Arc<UserLockManager>,
    ) -> Self {
        Self {
            balances,
            histories,
            validator: PointValidator::new(),
            lock_manager,
            read_consistency: ReadConsistency::Relaxed,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Build a service with in-memory stores from configuration.
    pub fn in_memory(config: &ServiceConfig) -> Self {
        let metrics: SharedMetrics = Arc::new(Metrics::new());
        let lock_manager = Arc::new(
            UserLockManager::new(config.lock_config.clone()).with_metrics(metrics.clone()),
        );
        let balances = Arc::new(InMemoryBalanceStore::new().with_latency(config.store_latency));
        let histories = Arc::new(InMemoryHistoryStore::new().with_latency(config.store_latency));

        Self::new(balances, histories, lock_manager)
            .with_read_consistency(config.read_consistency)
            .with_metrics(metrics)
    }

    /// Set the read locking policy.
    pub fn with_read_consistency(mut self, read_consistency: ReadConsistency) -> Self {
        self.read_consistency = read_consistency;
        self
    }

    /// Record outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// The lock manager guarding mutations.
    pub fn lock_manager(&self) -> &Arc<UserLockManager> {
        &self.lock_manager
    }

    /// Current balance of a user; zero for unknown users.
    #[instrument(skip(self, id), fields(user_id = %id))]
    pub async fn get_user_point(&self, id: UserId) -> Result<UserPoint> {
        self.validator.validate_id(id)?;
        let _guard = self.read_guard(id).await?;
        self.balances.select_by_id(id).await
    }

    /// A user's history in commit order.
    #[instrument(skip(self, id), fields(user_id = %id))]
    pub async fn get_point_history(&self, id: UserId) -> Result<Vec<PointHistory>> {
        self.validator.validate_id(id)?;
        let _guard = self.read_guard(id).await?;
        self.histories.select_all_by_user_id(id).await
    }

    /// Add `amount` points to a user's balance.
    pub async fn charge_point(&self, id: UserId, amount: i64) -> Result<UserPoint> {
        self.charge_point_with_cancel(id, amount, &CancellationToken::new())
            .await
    }

    /// Add `amount` points, abandoning the lock wait if `cancel` fires.
    #[instrument(skip(self, id, cancel), fields(user_id = %id))]
    pub async fn charge_point_with_cancel(
        &self,
        id: UserId,
        amount: i64,
        cancel: &CancellationToken,
    ) -> Result<UserPoint> {
        self.mutate(id, amount, TransactionType::Charge, cancel)
            .await
    }

    /// Spend `amount` points from a user's balance.
    pub async fn use_point(&self, id: UserId, amount: i64) -> Result<UserPoint> {
        self.use_point_with_cancel(id, amount, &CancellationToken::new())
            .await
    }

    /// Spend `amount` points, abandoning the lock wait if `cancel` fires.
    #[instrument(skip(self, id, cancel), fields(user_id = %id))]
    pub async fn use_point_with_cancel(
        &self,
        id: UserId,
        amount: i64,
        cancel: &CancellationToken,
    ) -> Result<UserPoint> {
        self.mutate(id, amount, TransactionType::Use, cancel).await
    }

    async fn read_guard(&self, id: UserId) -> Result<Option<UserLockGuard>> {
        match self.read_consistency {
            ReadConsistency::Relaxed => Ok(None),
            ReadConsistency::Locked => self.lock_manager.acquire_default(id).await.map(Some),
        }
    }

    fn validate_request(&self, id: UserId, amount: i64, kind: TransactionType) -> Result<()> {
        self.validator.validate_id(id)?;
        match kind {
            TransactionType::Charge => self.validator.validate_charge_amount(amount),
            TransactionType::Use => self.validator.validate_use_amount(amount),
        }
    }

    /// Validate the request and wait for the user's lock. Only this part of
    /// a mutation stops when the caller goes away.
    async fn admit(
        &self,
        id: UserId,
        amount: i64,
        kind: TransactionType,
        cancel: &CancellationToken,
    ) -> Result<UserLockGuard> {
        self.validate_request(id, amount, kind)?;
        self.lock_manager
            .acquire(id, self.lock_manager.default_timeout(), cancel)
            .await
    }

    async fn mutate(
        &self,
        id: UserId,
        amount: i64,
        kind: TransactionType,
        cancel: &CancellationToken,
    ) -> Result<UserPoint> {
        let guard = match self.admit(id, amount, kind, cancel).await {
            Ok(guard) => guard,
            Err(e) => {
                let result = Err(e);
                record_outcome(&self.metrics, kind, &result);
                return result;
            }
        };

        let commit = Commit {
            balances: Arc::clone(&self.balances),
            histories: Arc::clone(&self.histories),
            validator: self.validator,
            metrics: Arc::clone(&self.metrics),
            id,
            amount,
            kind,
        };

        // Dropping the join handle detaches the task, so the balance write
        // and the history append always run together once started.
        match tokio::spawn(commit.run(guard).in_current_span()).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.operation_failed();
                error!(user_id = %id, kind = %kind, amount, error = %e, "Commit task failed");
                Err(PointError::Store(format!("commit task failed: {e}")))
            }
        }
    }
}

/// The locked part of a mutation: fresh read, re-validation, balance write
/// and history append.
struct Commit {
    balances: Arc<dyn BalanceStore>,
    histories: Arc<dyn HistoryStore>,
    validator: PointValidator,
    metrics: SharedMetrics,
    id: UserId,
    amount: i64,
    kind: TransactionType,
}

impl Commit {
    /// Apply the mutation while holding `_guard`, which is released only
    /// after the outcome is recorded.
    async fn run(self, _guard: UserLockGuard) -> Result<UserPoint> {
        let result = self.apply().await;
        record_outcome(&self.metrics, self.kind, &result);
        result
    }

    fn next_balance(&self, current: i64) -> Result<i64> {
        match self.kind {
            TransactionType::Charge => {
                self.validator.validate_overflow(current, self.amount)?;
                Ok(current + self.amount)
            }
            TransactionType::Use => {
                self.validator.validate_balance(current, self.amount)?;
                Ok(current - self.amount)
            }
        }
    }

    async fn apply(&self) -> Result<UserPoint> {
        let (id, amount, kind) = (self.id, self.amount, self.kind);

        // Only the balance read under the lock is trusted.
        let current = self.balances.select_by_id(id).await?;
        let next = self.next_balance(current.point)?;

        let updated = self.balances.insert_or_update(id, next).await?;
        if let Err(e) = self
            .histories
            .insert(id, amount, kind, time::now_millis())
            .await
        {
            error!(
                user_id = %id,
                kind = %kind,
                amount,
                balance_before = current.point,
                balance_after = next,
                error = %e,
                "History append failed after balance update; stores are inconsistent"
            );
            return Err(e);
        }

        info!(
            user_id = %id,
            kind = %kind,
            amount,
            balance = updated.point,
            "Points updated"
        );
        Ok(updated)
    }
}

fn record_outcome(metrics: &Metrics, kind: TransactionType, result: &Result<UserPoint>) {
    match result {
        Ok(_) => match kind {
            TransactionType::Charge => metrics.charge_committed(),
            TransactionType::Use => metrics.use_committed(),
        },
        Err(e) if e.is_rejection() => {
            metrics.operation_rejected();
            warn!(kind = %kind, code = e.error_code(), error = %e, "Point request rejected");
        }
        Err(e) => {
            metrics.operation_failed();
            warn!(kind = %kind, code = e.error_code(), error = %e, "Point request failed");
        }
    }
}
