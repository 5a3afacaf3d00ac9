//! Shared helpers for point service integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pointledger_common::{PointError, Result, TransactionType, UserId};
use pointledger_ledger::{
    BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore, PointHistory,
    UserPoint,
};
use pointledger_server::{LockConfig, LockStrategy, PointService, ServiceConfig, UserLockManager};

/// Balance store that counts every call before delegating.
#[derive(Default)]
pub struct CountingBalanceStore {
    inner: InMemoryBalanceStore,
    pub calls: AtomicUsize,
}

impl CountingBalanceStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceStore for CountingBalanceStore {
    async fn select_by_id(&self, id: UserId) -> Result<UserPoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.select_by_id(id).await
    }

    async fn insert_or_update(&self, id: UserId, amount: i64) -> Result<UserPoint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_or_update(id, amount).await
    }
}

/// History store that counts every call before delegating.
#[derive(Default)]
pub struct CountingHistoryStore {
    inner: InMemoryHistoryStore,
    pub calls: AtomicUsize,
}

impl CountingHistoryStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for CountingHistoryStore {
    async fn insert(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionType,
        update_millis: i64,
    ) -> Result<PointHistory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(user_id, amount, kind, update_millis).await
    }

    async fn select_all_by_user_id(&self, user_id: UserId) -> Result<Vec<PointHistory>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.select_all_by_user_id(user_id).await
    }
}

/// History store whose appends always fail.
pub struct FailingHistoryStore;

#[async_trait]
impl HistoryStore for FailingHistoryStore {
    async fn insert(
        &self,
        _user_id: UserId,
        _amount: i64,
        _kind: TransactionType,
        _update_millis: i64,
    ) -> Result<PointHistory> {
        Err(PointError::Store("history table unavailable".to_string()))
    }

    async fn select_all_by_user_id(&self, _user_id: UserId) -> Result<Vec<PointHistory>> {
        Ok(Vec::new())
    }
}

pub fn lock_manager(timeout: Duration) -> Arc<UserLockManager> {
    Arc::new(UserLockManager::new(LockConfig {
        acquire_timeout: timeout,
        strategy: LockStrategy::PerKey,
    }))
}

/// In-memory service with default configuration.
pub fn default_service() -> PointService {
    PointService::in_memory(&ServiceConfig::default())
}

/// In-memory service whose stores sleep on every access.
pub fn slow_service(latency: Duration) -> PointService {
    let config = ServiceConfig {
        store_latency: latency,
        ..ServiceConfig::default()
    };
    PointService::in_memory(&config)
}
