//! In-memory store used by the reconciliation tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;

use super::{
    error::StoreError,
    ledger::LeaveBalance,
    period::Period,
    store::{
        AttendanceStore, EmployeeStore, LeaveRequestStore, ReconciliationLedger,
        ReconciliationRecord,
    },
};
use crate::model::{
    attendance::{AttendanceRecord, AttendanceStatus},
    employee::{Employee, EmployeeStatus},
    leave_request::{LeaveRequest, LeaveStatus, LeaveType},
};

#[derive(Default)]
struct State {
    employees: HashMap<u64, Employee>,
    leaves: Vec<LeaveRequest>,
    attendance: Vec<AttendanceRecord>,
    ledger: Vec<ReconciliationRecord>,
    next_id: u64,
    balance_override: Option<(u64, LeaveBalance)>,
}

/// Pauses one store call until the test releases it.
#[derive(Default)]
pub struct Gate {
    reached: Notify,
    release: Notify,
}

impl Gate {
    /// Resolves once the paused call has been entered.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.release.notified().await;
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_commit: AtomicBool,
    get_gate: Mutex<Option<Arc<Gate>>>,
    commit_gate: Mutex<Option<Arc<Gate>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, id: u64, sick_leave: u32, casual_leave: u32) {
        let employee = Employee {
            id,
            employee_code: format!("EMP-{id:03}"),
            first_name: format!("Employee {id}"),
            last_name: None,
            email: format!("employee{id}@company.com"),
            phone: None,
            department_id: None,
            designation: None,
            hire_date: None,
            salary: None,
            sick_leave,
            casual_leave,
            total_leave_taken: 0,
            status: EmployeeStatus::Active,
        };
        self.state.lock().unwrap().employees.insert(id, employee);
    }

    pub fn add_leave(
        &self,
        employee_id: u64,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        status: LeaveStatus,
    ) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.leaves.push(LeaveRequest {
            id,
            employee_id,
            leave_type,
            start_date,
            end_date,
            reason: None,
            status,
            approved_by: None,
            created_at: None,
        });
    }

    pub fn add_attendance(&self, employee_id: u64, date: NaiveDate, status: AttendanceStatus) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.attendance.push(AttendanceRecord {
            id,
            employee_id,
            date,
            check_in: None,
            check_out: None,
            total_working_hour: None,
            late_time: None,
            status,
        });
    }

    /// Makes the next commit fail with a storage error.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Simulates another writer updating the balance right before the next commit.
    pub fn change_balance_before_commit(&self, employee_id: u64, balance: LeaveBalance) {
        self.state.lock().unwrap().balance_override = Some((employee_id, balance));
    }

    /// Holds the next `get` until the returned gate is released.
    pub fn pause_next_get(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.get_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Holds the next `commit` until the returned gate is released.
    pub fn pause_next_commit(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.commit_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn ledger_len(&self) -> usize {
        self.state.lock().unwrap().ledger.len()
    }
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    async fn get(&self, employee_id: u64) -> Result<Option<Employee>, StoreError> {
        tokio::task::yield_now().await;
        let gate = self.get_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        Ok(self.state.lock().unwrap().employees.get(&employee_id).cloned())
    }

    async fn update_balances(
        &self,
        employee_id: u64,
        balance: LeaveBalance,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.employees.get_mut(&employee_id) {
            Some(employee) => {
                employee.sick_leave = balance.sick_leave;
                employee.casual_leave = balance.casual_leave;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LeaveRequestStore for MemoryStore {
    async fn find_approved_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        let mut leaves: Vec<LeaveRequest> = state
            .leaves
            .iter()
            .filter(|l| l.employee_id == employee_id && l.status == LeaveStatus::Approved)
            .filter(|l| period.overlaps(l.start_date, l.end_date))
            .cloned()
            .collect();
        leaves.sort_by_key(|l| (l.start_date, l.id));
        Ok(leaves)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_in_range(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .attendance
            .iter()
            .filter(|r| r.employee_id == employee_id && period.contains(r.date))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReconciliationLedger for MemoryStore {
    async fn find_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<ReconciliationRecord>, StoreError> {
        tokio::task::yield_now().await;
        let state = self.state.lock().unwrap();
        Ok(state
            .ledger
            .iter()
            .filter(|r| r.employee_id == employee_id)
            .filter(|r| period.overlaps(r.period.start(), r.period.end()))
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        record: &ReconciliationRecord,
        expected: LeaveBalance,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let gate = self.commit_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let mut state = self.state.lock().unwrap();
        if let Some((id, balance)) = state.balance_override.take() {
            if let Some(employee) = state.employees.get_mut(&id) {
                employee.sick_leave = balance.sick_leave;
                employee.casual_leave = balance.casual_leave;
            }
        }

        // Same order as the MySQL commit: balance first, then the ledger.
        let current = state.employees.get(&record.employee_id).map(Employee::balance);
        if current != Some(expected) {
            return Err(StoreError::BalanceChanged(record.employee_id));
        }

        if state.ledger.iter().any(|r| {
            r.employee_id == record.employee_id
                && record.period.overlaps(r.period.start(), r.period.end())
        }) {
            return Err(StoreError::DuplicateLedgerEntry(record.employee_id));
        }

        if let Some(employee) = state.employees.get_mut(&record.employee_id) {
            employee.sick_leave = record.result.leave_balance.sick_leave;
            employee.casual_leave = record.result.leave_balance.casual_leave;
        }

        state.ledger.push(record.clone());
        Ok(())
    }
}
