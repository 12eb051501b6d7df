//! Monthly attendance & leave reconciliation.
//!
//! Leaves are resolved first (ledger, overlap), then attendance is aggregated,
//! and the engine combines both into a [`engine::ReconciliationResult`] while
//! charging the employee's paid leave balances exactly once per period.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod ledger;
#[cfg(test)]
pub mod memory;
pub mod mysql;
pub mod overlap;
pub mod period;
pub mod store;

pub use engine::{Reconciliation, ReconciliationEngine, ReconciliationResult};
pub use error::{ReconcileError, StoreError};
pub use period::Period;
