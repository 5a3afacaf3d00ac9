//! PointLedger Common Types
//!
//! Shared types used across the PointLedger workspace: user identifiers,
//! transaction kinds, the error taxonomy and time helpers.

pub mod identifiers;
pub mod transaction;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use transaction::*;
pub use error::*;
pub use time::*;
