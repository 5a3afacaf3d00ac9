//! PointLedger Ledger
//!
//! Balance and history records, the storage contracts the point service
//! relies on, in-memory stores implementing them, and input validation.

pub mod balance;
pub mod history;
pub mod store;
pub mod validator;

pub use balance::UserPoint;
pub use history::PointHistory;
pub use store::{BalanceStore, HistoryStore, InMemoryBalanceStore, InMemoryHistoryStore};
pub use validator::PointValidator;
