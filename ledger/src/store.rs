//! Storage contracts for balances and history, with in-memory backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

use pointledger_common::{Result, TransactionType, UserId};

use crate::balance::UserPoint;
use crate::history::PointHistory;

/// Current balance per user.
///
/// `insert_or_update` must be atomic on its own. Callers serialize
/// read-modify-write sequences for a user themselves.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Read a user's balance, or a zero balance if the user has no record.
    async fn select_by_id(&self, id: UserId) -> Result<UserPoint>;

    /// Store `amount` as the user's balance and return the stored record.
    async fn insert_or_update(&self, id: UserId, amount: i64) -> Result<UserPoint>;
}

/// Append-only transaction history per user.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record and return it with its assigned sequence number.
    async fn insert(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionType,
        update_millis: i64,
    ) -> Result<PointHistory>;

    /// All records of a user in insertion order.
    async fn select_all_by_user_id(&self, user_id: UserId) -> Result<Vec<PointHistory>>;
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

/// Balance store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    balances: DashMap<UserId, UserPoint>,
    latency: Duration,
}

impl InMemoryBalanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every access by `latency`, widening race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of users with a stored balance.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Check if no balance has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn select_by_id(&self, id: UserId) -> Result<UserPoint> {
        simulate_latency(self.latency).await;
        Ok(self
            .balances
            .get(&id)
            .map(|b| b.clone())
            .unwrap_or_else(|| UserPoint::empty(id)))
    }

    async fn insert_or_update(&self, id: UserId, amount: i64) -> Result<UserPoint> {
        simulate_latency(self.latency).await;
        let balance = UserPoint::new(id, amount);
        self.balances.insert(id, balance.clone());
        trace!(user_id = %id, point = amount, "Balance stored");
        Ok(balance)
    }
}

/// History store backed by a single append-only vector.
#[derive(Debug)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<PointHistory>>,
    next_id: AtomicU64,
    latency: Duration,
}

impl InMemoryHistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            latency: Duration::ZERO,
        }
    }

    /// Delay every access by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Total number of records across all users.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn insert(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionType,
        update_millis: i64,
    ) -> Result<PointHistory> {
        simulate_latency(self.latency).await;

        // Sequence assignment and push happen under the same write lock so
        // ids follow insertion order.
        let mut records = self.records.write();
        let record = PointHistory {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            user_id,
            amount,
            kind,
            update_millis,
        };
        records.push(record.clone());
        trace!(user_id = %user_id, history_id = record.id, kind = %kind, "History appended");
        Ok(record)
    }

    async fn select_all_by_user_id(&self, user_id: UserId) -> Result<Vec<PointHistory>> {
        simulate_latency(self.latency).await;
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_unknown_user_reads_zero() {
        let store = InMemoryBalanceStore::new();
        let balance = assert_ok!(store.select_by_id(UserId::new(7)).await);

        assert_eq!(balance.id, UserId::new(7));
        assert_eq!(balance.point, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryBalanceStore::new();
        let id = UserId::new(1);

        store.insert_or_update(id, 100).await.unwrap();
        let stored = store.insert_or_update(id, 40).await.unwrap();

        assert_eq!(stored.point, 40);
        assert_eq!(store.select_by_id(id).await.unwrap().point, 40);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_per_user_and_ordered() {
        let store = InMemoryHistoryStore::new();
        let alice = UserId::new(1);
        let bob = UserId::new(2);

        store.insert(alice, 1000, TransactionType::Charge, 1).await.unwrap();
        store.insert(bob, 50, TransactionType::Charge, 2).await.unwrap();
        store.insert(alice, 300, TransactionType::Use, 3).await.unwrap();

        let records = store.select_all_by_user_id(alice).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].kind, TransactionType::Charge);
        assert_eq!(records[1].kind, TransactionType::Use);
        assert!(records[0].id < records[1].id);

        assert!(store.select_all_by_user_id(UserId::new(3)).await.unwrap().is_empty());
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one() {
        let store = InMemoryHistoryStore::new();
        let first = store
            .insert(UserId::new(1), 10, TransactionType::Charge, 0)
            .await
            .unwrap();
        assert_eq!(first.id, 1);
    }
}
