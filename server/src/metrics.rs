//! Metrics collection for point service monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point service metrics.
pub struct Metrics {
    /// Committed charges.
    pub charges_total: AtomicU64,
    /// Committed uses.
    pub uses_total: AtomicU64,
    /// Requests rejected for bad input or a business rule.
    pub operations_rejected: AtomicU64,
    /// Requests that failed for infrastructure reasons.
    pub operations_failed: AtomicU64,
    /// Total locks acquired.
    pub locks_acquired: AtomicU64,
    /// Locks currently held.
    pub locks_active: AtomicU64,
    /// Lock waits that hit the timeout.
    pub locks_timeout: AtomicU64,
    /// Lock waits that were cancelled.
    pub locks_cancelled: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self {
            charges_total: AtomicU64::new(0),
            uses_total: AtomicU64::new(0),
            operations_rejected: AtomicU64::new(0),
            operations_failed: AtomicU64::new(0),
            locks_acquired: AtomicU64::new(0),
            locks_active: AtomicU64::new(0),
            locks_timeout: AtomicU64::new(0),
            locks_cancelled: AtomicU64::new(0),
        }
    }

    /// Record a committed charge.
    pub fn charge_committed(&self) {
        self.charges_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a committed use.
    pub fn use_committed(&self) {
        self.uses_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected request.
    pub fn operation_rejected(&self) {
        self.operations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed request.
    pub fn operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment lock acquired.
    pub fn lock_acquired(&self) {
        self.locks_acquired.fetch_add(1, Ordering::Relaxed);
        self.locks_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record lock released.
    pub fn lock_released(&self) {
        self.locks_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record lock timeout. The lock was never held, so the gauge is untouched.
    pub fn lock_timeout(&self) {
        self.locks_timeout.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cancelled lock wait.
    pub fn lock_cancelled(&self) {
        self.locks_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            charges_total: self.charges_total.load(Ordering::Relaxed),
            uses_total: self.uses_total.load(Ordering::Relaxed),
            operations_rejected: self.operations_rejected.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            locks_acquired: self.locks_acquired.load(Ordering::Relaxed),
            locks_active: self.locks_active.load(Ordering::Relaxed),
            locks_timeout: self.locks_timeout.load(Ordering::Relaxed),
            locks_cancelled: self.locks_cancelled.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP pointledger_charges_total Total committed charges
# TYPE pointledger_charges_total counter
pointledger_charges_total {}

# HELP pointledger_uses_total Total committed uses
# TYPE pointledger_uses_total counter
pointledger_uses_total {}

# HELP pointledger_operations_rejected Total rejected requests
# TYPE pointledger_operations_rejected counter
pointledger_operations_rejected {}

# HELP pointledger_operations_failed Total failed requests
# TYPE pointledger_operations_failed counter
pointledger_operations_failed {}

# HELP pointledger_locks_acquired Total user locks acquired
# TYPE pointledger_locks_acquired counter
pointledger_locks_acquired {}

# HELP pointledger_locks_active Current held user locks
# TYPE pointledger_locks_active gauge
pointledger_locks_active {}

# HELP pointledger_locks_timeout Total lock wait timeouts
# TYPE pointledger_locks_timeout counter
pointledger_locks_timeout {}

# HELP pointledger_locks_cancelled Total cancelled lock waits
# TYPE pointledger_locks_cancelled counter
pointledger_locks_cancelled {}
"#,
            snapshot.charges_total,
            snapshot.uses_total,
            snapshot.operations_rejected,
            snapshot.operations_failed,
            snapshot.locks_acquired,
            snapshot.locks_active,
            snapshot.locks_timeout,
            snapshot.locks_cancelled,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub charges_total: u64,
    pub uses_total: u64,
    pub operations_rejected: u64,
    pub operations_failed: u64,
    pub locks_acquired: u64,
    pub locks_active: u64,
    pub locks_timeout: u64,
    pub locks_cancelled: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
