//! PointLedger Server
//!
//! The point service keeps one balance and an append-only history per user.
//! Mutations for the same user are serialized by a per-user lock and
//! re-validated against a balance read inside that lock; different users
//! proceed in parallel.

pub mod config;
pub mod http;
pub mod lock_manager;
pub mod metrics;
pub mod service;

pub use config::{LockConfig, LockStrategy, ReadConsistency, ServiceConfig};
pub use lock_manager::{UserLockGuard, UserLockManager};
pub use metrics::{Metrics, SharedMetrics};
pub use service::PointService;
