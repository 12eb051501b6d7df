use std::{sync::Arc, time::Duration};

use chrono::NaiveDate;
use futures::future::join_all;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use super::{
    aggregate::{AttendanceSummary, aggregate},
    error::{ReconcileError, StoreError},
    ledger::LeaveBalance,
    overlap::{ClippedLeave, resolve_overlaps},
    period::Period,
    store::{ReconciliationRecord, ReconciliationStore},
};
use crate::model::leave_request::LeaveType;

/// Per leave type days taken in a period. Paid types only count consumed days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaveTypesTaken {
    pub lwp: u32,
    pub casual_leave: u32,
    pub sick_leave: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReconciliationResult {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2026-11-01", value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(example = "2026-11-30", value_type = String, format = "date")]
    pub period_end: NaiveDate,
    /// Clipped days of every approved leave, charged or not
    #[schema(example = 5)]
    pub total_leave_days_in_month: u32,
    /// Present plus late
    #[schema(example = 20)]
    pub days_present: u32,
    #[schema(example = 2)]
    pub days_late: u32,
    #[schema(example = 5)]
    pub total_absent_days: u32,
    #[schema(example = 25)]
    pub total_paid_days: u32,
    /// Balances after this period was charged
    pub leave_balance: LeaveBalance,
    pub leave_types_taken: LeaveTypesTaken,
}

/// Outcome of a reconcile call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Computed now; balances were charged.
    Fresh(ReconciliationResult),
    /// The period was already reconciled; this is the stored result and nothing was charged.
    Replayed(ReconciliationResult),
}

impl Reconciliation {
    pub fn result(&self) -> &ReconciliationResult {
        match self {
            Reconciliation::Fresh(result) | Reconciliation::Replayed(result) => result,
        }
    }

    pub fn into_result(self) -> ReconciliationResult {
        match self {
            Reconciliation::Fresh(result) | Reconciliation::Replayed(result) => result,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Reconciliation::Replayed(_))
    }
}

/// Leave side of a reconciliation, before attendance is folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveSettlement {
    pub balance: LeaveBalance,
    pub adjusted_paid_days: u32,
    pub total_leave_days: u32,
    pub taken: LeaveTypesTaken,
}

/// Charges clipped leaves against `balance` in order.
///
/// A paid leave that exceeds the remaining balance still adds its full span to
/// `total_leave_days` but only the covered part to `adjusted_paid_days`; the
/// shortfall is neither charged nor counted as absence.
pub fn settle_leaves(balance: LeaveBalance, clipped: &[ClippedLeave]) -> LeaveSettlement {
    let mut settlement = LeaveSettlement {
        balance,
        adjusted_paid_days: 0,
        total_leave_days: 0,
        taken: LeaveTypesTaken::default(),
    };

    for leave in clipped {
        match leave.leave_type {
            LeaveType::Lwp => settlement.taken.lwp += leave.days,
            paid @ (LeaveType::SickLeave | LeaveType::CasualLeave) => {
                let (next, consumed) = settlement.balance.charge(paid, leave.days);
                settlement.balance = next;
                settlement.adjusted_paid_days += consumed;
                match paid {
                    LeaveType::SickLeave => settlement.taken.sick_leave += consumed,
                    _ => settlement.taken.casual_leave += consumed,
                }
            }
        }
        settlement.total_leave_days += leave.days;
    }

    settlement
}

pub fn summarize(
    employee_id: u64,
    period: Period,
    leaves: &LeaveSettlement,
    attendance: &AttendanceSummary,
) -> ReconciliationResult {
    let days_present = attendance.days_present();
    let accounted = days_present + leaves.total_leave_days;

    ReconciliationResult {
        employee_id,
        period_start: period.start(),
        period_end: period.end(),
        total_leave_days_in_month: leaves.total_leave_days,
        days_present,
        days_late: attendance.late,
        total_absent_days: period.days().saturating_sub(accounted),
        total_paid_days: days_present + leaves.adjusted_paid_days,
        leave_balance: leaves.balance,
        leave_types_taken: leaves.taken,
    }
}

/// Reconciles employees against a store, one period at a time.
///
/// Calls for the same employee are serialized in-process. Across processes the
/// store's commit re-checks the balance and the ledger under a row lock.
pub struct ReconciliationEngine<S> {
    store: Arc<S>,
    locks: Cache<u64, Arc<Mutex<()>>>,
}

impl<S> ReconciliationEngine<S>
where
    S: ReconciliationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(Duration::from_secs(3600))
                .build(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn reconcile(
        &self,
        employee_id: u64,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<Reconciliation, ReconcileError> {
        let period = Period::new(period_start, period_end)?;
        self.reconcile_period(employee_id, period).await
    }

    #[instrument(
        name = "reconcile",
        skip(self),
        fields(start = %period.start(), end = %period.end())
    )]
    pub async fn reconcile_period(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Reconciliation, ReconcileError> {
        let lock = self
            .locks
            .get_with(employee_id, async { Arc::new(Mutex::new(())) })
            .await;
        let _guard = lock.lock().await;

        let employee = self
            .store
            .get(employee_id)
            .await
            .map_err(ReconcileError::Storage)?
            .ok_or(ReconcileError::NotFound(employee_id))?;
        let opening = employee.balance();

        // Read the balance before the ledger: a commit by another process in
        // between makes our commit fail its balance check.
        let existing = self
            .store
            .find_overlapping(employee_id, period)
            .await
            .map_err(ReconcileError::Storage)?;
        if let Some(previous) = existing.iter().find(|r| r.period == period) {
            warn!("Period already reconciled, replaying stored result");
            return Ok(Reconciliation::Replayed(previous.result.clone()));
        }
        if let Some(other) = existing.first() {
            return Err(ReconcileError::PeriodOverlap {
                start: period.start(),
                end: period.end(),
                existing_start: other.period.start(),
                existing_end: other.period.end(),
            });
        }

        let clipped = resolve_overlaps(self.store.as_ref(), employee_id, period)
            .await
            .map_err(ReconcileError::Storage)?;
        let leaves = settle_leaves(opening, &clipped);
        debug!(
            total_leave_days = leaves.total_leave_days,
            adjusted_paid_days = leaves.adjusted_paid_days,
            "Settled leaves"
        );

        let attendance = aggregate(self.store.as_ref(), employee_id, period)
            .await
            .map_err(ReconcileError::Storage)?;

        let result = summarize(employee_id, period, &leaves, &attendance);
        let record = ReconciliationRecord {
            employee_id,
            period,
            charged: opening.charged_since(&leaves.balance),
            result: result.clone(),
        };

        self.store
            .commit(&record, opening)
            .await
            .map_err(|e| match e {
                StoreError::BalanceChanged(id) | StoreError::DuplicateLedgerEntry(id) => {
                    warn!(error = %e, "Reconciliation lost a race");
                    ReconcileError::Conflict(id)
                }
                other => {
                    tracing::error!(error = %other, "Failed to persist reconciliation");
                    ReconcileError::Persistence(other)
                }
            })?;

        info!(
            charged_sick = record.charged.sick_leave,
            charged_casual = record.charged.casual_leave,
            paid_days = result.total_paid_days,
            absent_days = result.total_absent_days,
            "Period reconciled"
        );

        Ok(Reconciliation::Fresh(result))
    }

    /// Reconciles several employees for the same period concurrently.
    pub async fn reconcile_all(
        &self,
        employee_ids: &[u64],
        period: Period,
    ) -> Vec<(u64, Result<Reconciliation, ReconcileError>)> {
        let futures = employee_ids.iter().map(|&id| async move {
            (id, self.reconcile_period(id, period).await)
        });
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{
            attendance::AttendanceStatus,
            leave_request::{LeaveStatus, LeaveType},
        },
        reconciliation::{memory::MemoryStore, store::EmployeeStore},
    };

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn nov() -> Period {
        Period::month(2026, 11).unwrap()
    }

    fn engine(store: MemoryStore) -> ReconciliationEngine<MemoryStore> {
        ReconciliationEngine::new(Arc::new(store))
    }

    fn clipped(leave_type: LeaveType, days: u32) -> ClippedLeave {
        ClippedLeave {
            leave_id: 0,
            leave_type,
            days,
        }
    }

    #[test]
    fn shortfall_counts_as_leave_but_not_paid() {
        let balance = LeaveBalance {
            sick_leave: 4,
            casual_leave: 8,
        };
        let settlement = settle_leaves(balance, &[clipped(LeaveType::SickLeave, 5)]);

        assert_eq!(settlement.adjusted_paid_days, 4);
        assert_eq!(settlement.total_leave_days, 5);
        assert_eq!(settlement.taken.sick_leave, 4);
        assert_eq!(settlement.balance.sick_leave, 0);
        assert_eq!(settlement.balance.casual_leave, 8);
    }

    #[test]
    fn lwp_is_never_paid() {
        let balance = LeaveBalance {
            sick_leave: 4,
            casual_leave: 8,
        };
        let settlement = settle_leaves(
            balance,
            &[clipped(LeaveType::Lwp, 3), clipped(LeaveType::CasualLeave, 2)],
        );

        assert_eq!(settlement.taken.lwp, 3);
        assert_eq!(settlement.taken.casual_leave, 2);
        assert_eq!(settlement.adjusted_paid_days, 2);
        assert_eq!(settlement.total_leave_days, 5);
        assert_eq!(settlement.balance.casual_leave, 6);
    }

    #[test]
    fn absence_is_the_unaccounted_residual() {
        let leaves = LeaveSettlement {
            balance: LeaveBalance::default(),
            adjusted_paid_days: 5,
            total_leave_days: 5,
            taken: LeaveTypesTaken::default(),
        };
        let attendance = AttendanceSummary {
            present: 18,
            late: 2,
            ..Default::default()
        };

        let result = summarize(1, nov(), &leaves, &attendance);
        assert_eq!(result.days_present, 20);
        assert_eq!(result.total_absent_days, 5);
        assert_eq!(result.total_paid_days, 25);
        assert_eq!(
            result.total_paid_days,
            result.days_present + leaves.adjusted_paid_days
        );
    }

    #[test]
    fn absence_never_goes_negative() {
        let leaves = LeaveSettlement {
            balance: LeaveBalance::default(),
            adjusted_paid_days: 0,
            total_leave_days: 20,
            taken: LeaveTypesTaken::default(),
        };
        let attendance = AttendanceSummary {
            present: 25,
            ..Default::default()
        };

        let result = summarize(1, nov(), &leaves, &attendance);
        assert_eq!(result.total_absent_days, 0);
    }

    #[test]
    fn leave_types_taken_uses_snake_case_keys() {
        let taken = LeaveTypesTaken {
            lwp: 1,
            casual_leave: 2,
            sick_leave: 3,
        };
        assert_eq!(
            serde_json::to_value(taken).unwrap(),
            serde_json::json!({ "lwp": 1, "casual_leave": 2, "sick_leave": 3 })
        );
    }

    #[tokio::test]
    async fn reconcile_charges_balances_and_records_the_period() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.add_leave(1, LeaveType::SickLeave, d(11, 10), d(11, 14), LeaveStatus::Approved);
        store.add_leave(1, LeaveType::CasualLeave, d(10, 28), d(11, 3), LeaveStatus::Approved);
        store.add_leave(1, LeaveType::CasualLeave, d(11, 20), d(11, 21), LeaveStatus::Pending);
        for day in 15..=30 {
            store.add_attendance(1, d(11, day), AttendanceStatus::Present);
        }
        store.add_attendance(1, d(11, 4), AttendanceStatus::Late);

        let engine = engine(store);
        let outcome = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        assert!(!outcome.is_replay());

        let result = outcome.result();
        assert_eq!(result.total_leave_days_in_month, 8);
        assert_eq!(result.leave_types_taken.sick_leave, 4);
        assert_eq!(result.leave_types_taken.casual_leave, 3);
        assert_eq!(result.days_present, 17);
        assert_eq!(result.days_late, 1);
        assert_eq!(result.total_paid_days, 17 + 7);
        assert_eq!(result.total_absent_days, 30 - (17 + 8));
        assert_eq!(
            result.leave_balance,
            LeaveBalance {
                sick_leave: 0,
                casual_leave: 5
            }
        );

        let stored = engine.store().get(1).await.unwrap().unwrap();
        assert_eq!(stored.sick_leave, 0);
        assert_eq!(stored.casual_leave, 5);
        assert_eq!(engine.store().ledger_len(), 1);
    }

    #[tokio::test]
    async fn rerunning_a_period_replays_without_charging_again() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.add_leave(1, LeaveType::CasualLeave, d(11, 2), d(11, 3), LeaveStatus::Approved);

        let engine = engine(store);
        let first = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        let second = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();

        assert!(second.is_replay());
        assert_eq!(first.result(), second.result());
        assert_eq!(engine.store().get(1).await.unwrap().unwrap().casual_leave, 6);
    }

    #[tokio::test]
    async fn overlapping_but_different_period_is_rejected() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);

        let engine = engine(store);
        engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        let err = engine.reconcile(1, d(11, 15), d(12, 15)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::PeriodOverlap { .. }));

        engine.reconcile(1, d(12, 1), d(12, 31)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_employee_and_bad_period_have_no_side_effects() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        let engine = engine(store);

        let err = engine.reconcile(99, d(11, 1), d(11, 30)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(99)));

        let err = engine.reconcile(1, d(11, 30), d(11, 1)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidPeriod { .. }));

        assert_eq!(engine.store().ledger_len(), 0);
    }

    #[tokio::test]
    async fn failed_persist_discards_result_and_retry_succeeds() {
        let store = MemoryStore::new();
        store.add_employee(1, 2, 8);
        store.add_leave(1, LeaveType::SickLeave, d(11, 5), d(11, 6), LeaveStatus::Approved);
        store.fail_next_commit();

        let engine = engine(store);
        let err = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Persistence(_)));
        assert_eq!(engine.store().get(1).await.unwrap().unwrap().sick_leave, 2);
        assert_eq!(engine.store().ledger_len(), 0);

        let retry = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        assert!(!retry.is_replay());
        assert_eq!(retry.result().leave_balance.sick_leave, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reconciliations_charge_once() {
        let store = MemoryStore::new();
        store.add_employee(1, 2, 8);
        store.add_leave(1, LeaveType::SickLeave, d(11, 5), d(11, 6), LeaveStatus::Approved);

        let engine = Arc::new(engine(store));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.reconcile(1, d(11, 1), d(11, 30)).await })
            })
            .collect();

        let mut fresh = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if !outcome.is_replay() {
                fresh += 1;
            }
            assert_eq!(outcome.result().leave_balance.sick_leave, 0);
        }

        assert_eq!(fresh, 1);
        assert_eq!(engine.store().get(1).await.unwrap().unwrap().sick_leave, 0);
        assert_eq!(engine.store().ledger_len(), 1);
    }

    #[tokio::test]
    async fn stale_balance_is_reported_as_conflict() {
        let store = MemoryStore::new();
        store.add_employee(1, 2, 8);
        store.add_leave(1, LeaveType::SickLeave, d(11, 5), d(11, 6), LeaveStatus::Approved);
        // another writer changes the balance between read and commit
        store.change_balance_before_commit(1, LeaveBalance {
            sick_leave: 1,
            casual_leave: 8,
        });

        let engine = engine(store);
        let err = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict(1)));
        assert_eq!(engine.store().get(1).await.unwrap().unwrap().sick_leave, 1);

        let retry = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        assert_eq!(retry.result().leave_balance.sick_leave, 0);
        assert_eq!(retry.result().leave_types_taken.sick_leave, 1);
    }

    type Shared = Arc<ReconciliationEngine<MemoryStore>>;

    /// Two engines with separate lock registries over one store.
    fn two_processes(
        store: MemoryStore,
    ) -> (Arc<MemoryStore>, Shared, ReconciliationEngine<MemoryStore>) {
        let store = Arc::new(store);
        let first = Arc::new(ReconciliationEngine::new(store.clone()));
        let second = ReconciliationEngine::new(store.clone());
        (store, first, second)
    }

    #[tokio::test]
    async fn overlapping_period_committed_by_another_engine_is_not_charged_twice() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.add_leave(1, LeaveType::CasualLeave, d(11, 20), d(11, 21), LeaveStatus::Approved);
        let (store, late, early) = two_processes(store);

        // the late engine stalls on its balance read until November is committed
        let gate = store.pause_next_get();
        let pending = tokio::spawn(async move { late.reconcile(1, d(11, 15), d(12, 15)).await });
        gate.reached().await;

        let november = early.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        assert_eq!(november.result().leave_balance.casual_leave, 6);
        gate.release();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ReconcileError::PeriodOverlap { .. }));
        assert_eq!(store.get(1).await.unwrap().unwrap().casual_leave, 6);
        assert_eq!(store.ledger_len(), 1);
    }

    #[tokio::test]
    async fn commit_rejects_a_period_overlapping_a_concurrent_commit() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        let (store, late, early) = two_processes(store);

        // nothing is charged, so only the ledger check can stop the late commit
        let gate = store.pause_next_commit();
        let retry_engine = late.clone();
        let pending = tokio::spawn(async move { late.reconcile(1, d(11, 15), d(12, 15)).await });
        gate.reached().await;

        early.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        gate.release();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict(1)));
        assert_eq!(store.ledger_len(), 1);

        let err = retry_engine.reconcile(1, d(11, 15), d(12, 15)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::PeriodOverlap { .. }));
    }

    #[tokio::test]
    async fn zero_charge_commit_still_checks_the_balance() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.change_balance_before_commit(1, LeaveBalance {
            sick_leave: 3,
            casual_leave: 8,
        });

        let engine = engine(store);
        let err = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Conflict(1)));
        assert_eq!(engine.store().ledger_len(), 0);

        let retry = engine.reconcile(1, d(11, 1), d(11, 30)).await.unwrap();
        assert_eq!(retry.result().leave_balance.sick_leave, 3);
    }

    #[tokio::test]
    async fn employees_are_reconciled_independently() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.add_employee(2, 4, 8);
        store.add_leave(2, LeaveType::CasualLeave, d(11, 2), d(11, 4), LeaveStatus::Approved);

        let engine = engine(store);
        let outcomes = engine.reconcile_all(&[1, 2, 3], nov()).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].1.as_ref().unwrap().result().leave_balance.casual_leave, 8);
        assert_eq!(outcomes[1].1.as_ref().unwrap().result().leave_balance.casual_leave, 5);
        assert!(matches!(outcomes[2].1, Err(ReconcileError::NotFound(3))));
    }
}
