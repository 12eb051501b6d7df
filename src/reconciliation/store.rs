use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    engine::ReconciliationResult, error::StoreError, ledger::LeaveBalance, period::Period,
};
use crate::model::{attendance::AttendanceRecord, employee::Employee, leave_request::LeaveRequest};

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn get(&self, employee_id: u64) -> Result<Option<Employee>, StoreError>;

    /// Overwrites both balances. Returns `false` when the employee does not exist.
    async fn update_balances(
        &self,
        employee_id: u64,
        balance: LeaveBalance,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LeaveRequestStore: Send + Sync {
    /// Approved requests of the employee intersecting `period`, ordered by start date then id.
    async fn find_approved_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<LeaveRequest>, StoreError>;
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_in_range(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<AttendanceRecord>, StoreError>;
}

/// What a reconciliation charged, keyed by employee and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub employee_id: u64,
    pub period: Period,
    pub charged: LeaveBalance,
    pub result: ReconciliationResult,
}

#[async_trait]
pub trait ReconciliationLedger: Send + Sync {
    /// Records of the employee whose period intersects `period`.
    async fn find_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<ReconciliationRecord>, StoreError>;

    /// Atomically moves the employee's balances from `expected` to the
    /// record's post-charge balance and stores the record.
    ///
    /// Holds the employee exclusively while it checks, then writes:
    /// fails with [`StoreError::BalanceChanged`] when the stored balances no
    /// longer equal `expected` (even if nothing is charged), and with
    /// [`StoreError::DuplicateLedgerEntry`] when a record overlapping the
    /// period exists. Nothing is written on failure.
    async fn commit(
        &self,
        record: &ReconciliationRecord,
        expected: LeaveBalance,
    ) -> Result<(), StoreError>;
}

/// Everything the engine needs from storage.
pub trait ReconciliationStore:
    EmployeeStore + LeaveRequestStore + AttendanceStore + ReconciliationLedger
{
}

impl<T> ReconciliationStore for T where
    T: EmployeeStore + LeaveRequestStore + AttendanceStore + ReconciliationLedger
{
}
