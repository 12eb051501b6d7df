use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySqlPool, types::Json};

use super::{
    engine::ReconciliationResult,
    error::StoreError,
    ledger::LeaveBalance,
    period::Period,
    store::{
        AttendanceStore, EmployeeStore, LeaveRequestStore, ReconciliationLedger,
        ReconciliationRecord,
    },
};
use crate::model::{
    attendance::AttendanceRecord,
    employee::{EMPLOYEE_COLUMNS, Employee},
    leave_request::LeaveRequest,
};

/// MySQL error code for a duplicate key.
const DUPLICATE_ENTRY: &str = "23000";

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    employee_id: u64,
    period_start: NaiveDate,
    period_end: NaiveDate,
    charged_sick: u32,
    charged_casual: u32,
    result: Json<ReconciliationResult>,
}

impl LedgerRow {
    fn into_record(self) -> Result<ReconciliationRecord, StoreError> {
        let period = Period::new(self.period_start, self.period_end)
            .map_err(|e| StoreError::Unavailable(format!("corrupt ledger row: {e}")))?;
        Ok(ReconciliationRecord {
            employee_id: self.employee_id,
            period,
            charged: LeaveBalance {
                sick_leave: self.charged_sick,
                casual_leave: self.charged_casual,
            },
            result: self.result.0,
        })
    }
}

#[async_trait]
impl EmployeeStore for MySqlStore {
    async fn get(&self, employee_id: u64) -> Result<Option<Employee>, StoreError> {
        let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
        let employee = sqlx::query_as::<_, Employee>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    async fn update_balances(
        &self,
        employee_id: u64,
        balance: LeaveBalance,
    ) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(&self.pool)
            .await?;
        if found == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE employees SET sick_leave = ?, casual_leave = ? WHERE id = ?")
            .bind(balance.sick_leave)
            .bind(balance.casual_leave)
            .bind(employee_id)
            .execute(&self.pool)
            .await?;
        Ok(true)
    }
}

#[async_trait]
impl LeaveRequestStore for MySqlStore {
    async fn find_approved_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<LeaveRequest>, StoreError> {
        let leaves = sqlx::query_as::<_, LeaveRequest>(
            r#"
            SELECT id, employee_id, leave_type, start_date, end_date, reason, status, approved_by, created_at
            FROM leave_requests
            WHERE employee_id = ?
            AND status = 'approved'
            AND start_date <= ?
            AND end_date >= ?
            ORDER BY start_date, id
            "#,
        )
        .bind(employee_id)
        .bind(period.end())
        .bind(period.start())
        .fetch_all(&self.pool)
        .await?;
        Ok(leaves)
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_in_range(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, employee_id, date, check_in, check_out, total_working_hour, late_time, status
            FROM attendance
            WHERE employee_id = ?
            AND date BETWEEN ? AND ?
            ORDER BY date, id
            "#,
        )
        .bind(employee_id)
        .bind(period.start())
        .bind(period.end())
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

#[async_trait]
impl ReconciliationLedger for MySqlStore {
    async fn find_overlapping(
        &self,
        employee_id: u64,
        period: Period,
    ) -> Result<Vec<ReconciliationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT employee_id, period_start, period_end, charged_sick, charged_casual, result
            FROM reconciliations
            WHERE employee_id = ?
            AND period_start <= ?
            AND period_end >= ?
            ORDER BY period_start
            "#,
        )
        .bind(employee_id)
        .bind(period.end())
        .bind(period.start())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerRow::into_record).collect()
    }

    async fn commit(
        &self,
        record: &ReconciliationRecord,
        expected: LeaveBalance,
    ) -> Result<(), StoreError> {
        let next = record.result.leave_balance;
        let mut tx = self.pool.begin().await?;

        // Row lock serializes commits for this employee across processes.
        let current = sqlx::query_as::<_, (u32, u32)>(
            "SELECT sick_leave, casual_leave FROM employees WHERE id = ? FOR UPDATE",
        )
        .bind(record.employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|(sick_leave, casual_leave)| LeaveBalance {
            sick_leave,
            casual_leave,
        });

        if current != Some(expected) {
            tx.rollback().await?;
            return Err(StoreError::BalanceChanged(record.employee_id));
        }

        let overlapping = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM reconciliations
            WHERE employee_id = ?
            AND period_start <= ?
            AND period_end >= ?
            LOCK IN SHARE MODE
            "#,
        )
        .bind(record.employee_id)
        .bind(record.period.end())
        .bind(record.period.start())
        .fetch_one(&mut *tx)
        .await?;

        if overlapping > 0 {
            tx.rollback().await?;
            return Err(StoreError::DuplicateLedgerEntry(record.employee_id));
        }

        sqlx::query("UPDATE employees SET sick_leave = ?, casual_leave = ? WHERE id = ?")
            .bind(next.sick_leave)
            .bind(next.casual_leave)
            .bind(record.employee_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO reconciliations
                (employee_id, period_start, period_end, charged_sick, charged_casual, result)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.period.start())
        .bind(record.period.end())
        .bind(record.charged.sick_leave)
        .bind(record.charged.casual_leave)
        .bind(Json(&record.result))
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some(DUPLICATE_ENTRY) {
                    tx.rollback().await?;
                    return Err(StoreError::DuplicateLedgerEntry(record.employee_id));
                }
            }
            return Err(e.into());
        }

        tx.commit().await?;
        Ok(())
    }
}
