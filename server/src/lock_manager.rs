//! Per-user lock management.
//!
//! Every read-modify-write on a user's balance runs while holding that
//! user's lock. Users never contend with each other unless the striped
//! strategy happens to map them onto the same mutex.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pointledger_common::{PointError, Result, UserId};

use crate::config::{LockConfig, LockStrategy};
use crate::metrics::SharedMetrics;

enum LockTable {
    PerKey(DashMap<UserId, Arc<Mutex<()>>>),
    Striped(Vec<Arc<Mutex<()>>>),
}

/// Exclusive hold on one user's lock. Dropping it releases the lock.
pub struct UserLockGuard {
    user_id: UserId,
    acquired_at: Instant,
    metrics: Option<SharedMetrics>,
    _guard: OwnedMutexGuard<()>,
}

impl UserLockGuard {
    /// User this guard protects.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        if let Some(metrics) = &self.metrics {
            metrics.lock_released();
        }
        debug!(
            user_id = %self.user_id,
            held_us = self.acquired_at.elapsed().as_micros() as u64,
            "User lock released"
        );
    }
}

impl std::fmt::Debug for UserLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLockGuard")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Manager for per-user locks.
pub struct UserLockManager {
    /// Mutexes by user or by stripe.
    table: LockTable,
    /// Configuration.
    config: LockConfig,
    /// Optional metrics sink.
    metrics: Option<SharedMetrics>,
}

impl UserLockManager {
    /// Create a new lock manager.
    pub fn new(config: LockConfig) -> Self {
        let table = match config.strategy {
            LockStrategy::PerKey => LockTable::PerKey(DashMap::new()),
            LockStrategy::Striped { stripes } => LockTable::Striped(
                (0..stripes.max(1))
                    .map(|_| Arc::new(Mutex::new(())))
                    .collect(),
            ),
        };

        Self {
            table,
            config,
            metrics: None,
        }
    }

    /// Report acquisitions, releases and timeouts to `metrics`.
    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configured acquisition bound.
    pub fn default_timeout(&self) -> Duration {
        self.config.acquire_timeout
    }

    fn stripe_index(user_id: UserId, stripes: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        (hasher.finish() % stripes as u64) as usize
    }

    /// Mutex for `user_id`, created on first use under the per-key strategy.
    fn mutex_for(&self, user_id: UserId) -> Arc<Mutex<()>> {
        match &self.table {
            LockTable::PerKey(locks) => {
                if let Some(lock) = locks.get(&user_id) {
                    return Arc::clone(lock.value());
                }
                let entry = locks
                    .entry(user_id)
                    .or_insert_with(|| Arc::new(Mutex::new(())));
                Arc::clone(entry.value())
            }
            LockTable::Striped(stripes) => {
                Arc::clone(&stripes[Self::stripe_index(user_id, stripes.len())])
            }
        }
    }

    /// Wait for the user's lock.
    ///
    /// Returns `LockTimeout` once `timeout` elapses and `Cancelled` when
    /// `cancel` fires first. Neither outcome leaves the lock held.
    pub async fn acquire(
        &self,
        user_id: UserId,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<UserLockGuard> {
        let mutex = self.mutex_for(user_id);
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            locked = tokio::time::timeout(timeout, mutex.lock_owned()) => Some(locked),
        };

        match outcome {
            Some(Ok(guard)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.lock_acquired();
                }
                debug!(
                    user_id = %user_id,
                    waited_us = started.elapsed().as_micros() as u64,
                    "User lock acquired"
                );
                Ok(UserLockGuard {
                    user_id,
                    acquired_at: Instant::now(),
                    metrics: self.metrics.clone(),
                    _guard: guard,
                })
            }
            Some(Err(_elapsed)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.lock_timeout();
                }
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(user_id = %user_id, waited_ms, "Timed out waiting for user lock");
                Err(PointError::LockTimeout { user_id, waited_ms })
            }
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.lock_cancelled();
                }
                info!(user_id = %user_id, "User lock wait cancelled");
                Err(PointError::Cancelled { user_id })
            }
        }
    }

    /// Wait for the user's lock with the configured timeout and no
    /// cancellation.
    pub async fn acquire_default(&self, user_id: UserId) -> Result<UserLockGuard> {
        self.acquire(user_id, self.config.acquire_timeout, &CancellationToken::new())
            .await
    }

    /// Check whether the user's lock is currently held. Does not create an
    /// entry for unseen users.
    pub fn is_locked(&self, user_id: UserId) -> bool {
        match &self.table {
            LockTable::PerKey(locks) => locks
                .get(&user_id)
                .map(|lock| lock.try_lock().is_err())
                .unwrap_or(false),
            LockTable::Striped(stripes) => stripes[Self::stripe_index(user_id, stripes.len())]
                .try_lock()
                .is_err(),
        }
    }

    /// Number of mutexes the manager currently holds.
    pub fn tracked_keys(&self) -> usize {
        match &self.table {
            LockTable::PerKey(locks) => locks.len(),
            LockTable::Striped(stripes) => stripes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;

    fn per_key_manager() -> UserLockManager {
        UserLockManager::new(LockConfig::default())
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let manager = per_key_manager();
        let user = UserId::new(1);

        let guard = manager.acquire_default(user).await.unwrap();
        assert_eq!(guard.user_id(), user);
        assert!(manager.is_locked(user));

        drop(guard);
        assert!(!manager.is_locked(user));
    }

    #[tokio::test]
    async fn test_entries_created_lazily() {
        let manager = per_key_manager();
        assert_eq!(manager.tracked_keys(), 0);
        assert!(!manager.is_locked(UserId::new(5)));
        assert_eq!(manager.tracked_keys(), 0);

        let _a = manager.acquire_default(UserId::new(5)).await.unwrap();
        let _b = manager.acquire_default(UserId::new(6)).await.unwrap();
        assert_eq!(manager.tracked_keys(), 2);
    }

    #[tokio::test]
    async fn test_timeout_while_held() {
        let metrics = Arc::new(Metrics::new());
        let manager = per_key_manager().with_metrics(metrics.clone());
        let user = UserId::new(1);

        let _held = manager.acquire_default(user).await.unwrap();
        let result = manager
            .acquire(user, Duration::from_millis(20), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(PointError::LockTimeout { user_id, .. }) if user_id == user));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.locks_timeout, 1);
        assert_eq!(snapshot.locks_active, 1);
    }

    #[tokio::test]
    async fn test_distinct_users_do_not_contend() {
        let manager = per_key_manager();

        let _a = manager.acquire_default(UserId::new(1)).await.unwrap();
        let b = manager
            .acquire(UserId::new(2), Duration::from_millis(20), &CancellationToken::new())
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_before_acquire() {
        let manager = per_key_manager();
        let user = UserId::new(1);
        let token = CancellationToken::new();
        token.cancel();

        let result = manager.acquire(user, Duration::from_secs(5), &token).await;
        assert_eq!(result.unwrap_err(), PointError::Cancelled { user_id: user });
        assert!(!manager.is_locked(user));
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let manager = Arc::new(per_key_manager());
        let user = UserId::new(1);
        let held = manager.acquire_default(user).await.unwrap();

        let token = CancellationToken::new();
        let waiter = {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move { manager.acquire(user, Duration::from_secs(5), &token).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PointError::Cancelled { .. })));

        drop(held);
        assert!(!manager.is_locked(user));
        assert!(manager.acquire_default(user).await.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let manager = Arc::new(per_key_manager());
        let user = UserId::new(1);
        let held = manager.acquire_default(user).await.unwrap();

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire_default(user).await.map(|g| g.user_id()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), user);
    }

    #[tokio::test]
    async fn test_striped_pool_is_bounded() {
        let manager = UserLockManager::new(LockConfig {
            strategy: LockStrategy::Striped { stripes: 4 },
            ..LockConfig::default()
        });

        for id in 1..=100 {
            let guard = manager.acquire_default(UserId::new(id)).await.unwrap();
            assert!(manager.is_locked(UserId::new(id)));
            drop(guard);
        }
        assert_eq!(manager.tracked_keys(), 4);
    }
}
