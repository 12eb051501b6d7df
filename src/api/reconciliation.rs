use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{bad_request, internal_error},
    auth::auth::AuthUser,
    config::Config,
    model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus},
    reconciliation::{
        Period, ReconciliationEngine, ReconciliationResult, mysql::MySqlStore,
        store::ReconciliationStore,
    },
    utils::attendance_rules::office_now,
};

pub type Engine = ReconciliationEngine<MySqlStore>;

#[derive(Deserialize, ToSchema)]
pub struct ReconcileRequest {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2026-11-01", value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(example = "2026-11-30", value_type = String, format = "date")]
    pub period_end: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct ReconcileResponse {
    /// `true` when the period had already been reconciled and nothing was charged
    pub replayed: bool,
    pub result: ReconciliationResult,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthlyReportQuery {
    /// 1-12, defaults to the current month in office time
    pub month: Option<u32>,
    /// Defaults to the current year in office time
    pub year: Option<i32>,
}

/// Who a report line is about.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportEmployee {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub name: String,
    #[schema(example = "john.doe@company.com")]
    pub email: String,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
    #[schema(example = "Engineer", nullable = true)]
    pub designation: Option<String>,
    pub status: EmployeeStatus,
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    #[sqlx(flatten)]
    employee: Employee,
    department: Option<String>,
}

impl From<ReportRow> for ReportEmployee {
    fn from(row: ReportRow) -> Self {
        let name = row.employee.full_name();
        let Employee {
            id,
            employee_code,
            email,
            designation,
            status,
            ..
        } = row.employee;
        Self {
            employee_id: id,
            employee_code,
            name,
            email,
            department: row.department,
            designation,
            status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyReportEntry {
    pub employee: ReportEmployee,
    pub replayed: bool,
    pub result: ReconciliationResult,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportFailure {
    pub employee_id: u64,
    #[schema(example = "Conflict")]
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyReport {
    #[schema(example = 11)]
    pub month: u32,
    #[schema(example = 2026)]
    pub year: i32,
    pub employees: Vec<MonthlyReportEntry>,
    pub failures: Vec<ReportFailure>,
}

/// Reconciles every listed employee for `period` and splits outcomes into entries and failures.
pub async fn build_report<S>(
    engine: &ReconciliationEngine<S>,
    employees: Vec<ReportEmployee>,
    period: Period,
) -> MonthlyReport
where
    S: ReconciliationStore,
{
    let ids: Vec<u64> = employees.iter().map(|e| e.employee_id).collect();
    let outcomes = engine.reconcile_all(&ids, period).await;

    let mut report = MonthlyReport {
        month: period.start().month(),
        year: period.start().year(),
        employees: Vec::with_capacity(outcomes.len()),
        failures: Vec::new(),
    };

    for ((employee_id, outcome), employee) in outcomes.into_iter().zip(employees) {
        match outcome {
            Ok(reconciliation) => report.employees.push(MonthlyReportEntry {
                employee,
                replayed: reconciliation.is_replay(),
                result: reconciliation.into_result(),
            }),
            Err(e) => {
                warn!(employee_id, error = %e, "Employee left out of monthly report");
                report.failures.push(ReportFailure {
                    employee_id,
                    error: e.kind().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    report
}

/// Reconcile one employee for an explicit period
#[utoipa::path(
    post,
    path = "/api/reconciliation",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciled, or replayed when the period was already reconciled", body = ReconcileResponse),
        (status = 400, description = "period_end before period_start"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Overlaps another reconciled period, or lost a concurrent race"),
        (status = 500, description = "Storage failure")
    ),
    security(("bearer_auth" = [])),
    tag = "Reconciliation"
)]
pub async fn reconcile(
    auth: AuthUser,
    engine: web::Data<Engine>,
    payload: web::Json<ReconcileRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let outcome = engine
        .reconcile(payload.employee_id, payload.period_start, payload.period_end)
        .await?;

    info!(
        employee_id = payload.employee_id,
        replayed = outcome.is_replay(),
        by = auth.user_id,
        "Reconciliation requested"
    );

    Ok(HttpResponse::Ok().json(ReconcileResponse {
        replayed: outcome.is_replay(),
        result: outcome.into_result(),
    }))
}

/// Monthly attendance and leave report for all active employees
#[utoipa::path(
    get,
    path = "/api/reports/monthly",
    params(MonthlyReportQuery),
    responses(
        (status = 200, description = "Per employee results plus failures", body = MonthlyReport),
        (status = 400, description = "Invalid month or year"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reconciliation"
)]
pub async fn monthly_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    query: web::Query<MonthlyReportQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let today = office_now(config.office_offset).date();
    let month = query.month.unwrap_or(today.month());
    let year = query.year.unwrap_or(today.year());

    let Some(period) = Period::month(year, month) else {
        return Ok(bad_request(format!("Invalid month {month} or year {year}")));
    };

    let sql = format!(
        r#"
        SELECT {EMPLOYEE_COLUMNS},
            (SELECT name FROM departments WHERE departments.id = employees.department_id) AS department
        FROM employees
        WHERE status <> ?
        ORDER BY id
        "#
    );
    let employees = sqlx::query_as::<_, ReportRow>(&sql)
        .bind(EmployeeStatus::Inactive)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to list employees for report"))?
        .into_iter()
        .map(ReportEmployee::from)
        .collect::<Vec<_>>();

    info!(month, year, employees = employees.len(), "Building monthly report");

    let report = build_report(engine.get_ref(), employees, period).await;
    Ok(HttpResponse::Ok().json(report))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        model::{
            attendance::AttendanceStatus,
            leave_request::{LeaveStatus, LeaveType},
        },
        reconciliation::memory::MemoryStore,
    };

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn subject(id: u64, name: &str, department: Option<&str>) -> ReportEmployee {
        ReportEmployee {
            employee_id: id,
            employee_code: format!("EMP-{id:03}"),
            name: name.to_string(),
            email: format!("{}@company.com", name.to_lowercase()),
            department: department.map(str::to_string),
            designation: Some("Engineer".to_string()),
            status: EmployeeStatus::Active,
        }
    }

    #[test]
    fn report_row_carries_profile_fields() {
        let row = ReportRow {
            employee: Employee {
                id: 4,
                employee_code: "EMP-004".into(),
                first_name: "John".into(),
                last_name: Some("Doe".into()),
                email: "john.doe@company.com".into(),
                phone: None,
                department_id: Some(2),
                designation: Some("Engineer".into()),
                hire_date: None,
                salary: None,
                sick_leave: 4,
                casual_leave: 8,
                total_leave_taken: 0,
                status: EmployeeStatus::OnLeave,
            },
            department: Some("Engineering".into()),
        };

        let employee = ReportEmployee::from(row);
        assert_eq!(employee.employee_id, 4);
        assert_eq!(employee.name, "John Doe");
        assert_eq!(employee.email, "john.doe@company.com");
        assert_eq!(employee.department.as_deref(), Some("Engineering"));
        assert_eq!(employee.designation.as_deref(), Some("Engineer"));
        assert_eq!(employee.status, EmployeeStatus::OnLeave);
    }

    #[tokio::test]
    async fn report_lists_results_and_failures_in_order() {
        let store = MemoryStore::new();
        store.add_employee(1, 4, 8);
        store.add_employee(2, 0, 0);
        store.add_leave(1, LeaveType::CasualLeave, d(2), d(3), LeaveStatus::Approved);
        store.add_attendance(2, d(2), AttendanceStatus::Present);

        let engine = ReconciliationEngine::new(Arc::new(store));
        let period = Period::month(2026, 11).unwrap();
        let employees = vec![
            subject(1, "Asha", Some("Engineering")),
            subject(9, "Ghost", None),
            subject(2, "Ravi", Some("Finance")),
        ];

        let report = build_report(&engine, employees.clone(), period).await;
        assert_eq!((report.month, report.year), (11, 2026));
        assert_eq!(
            report
                .employees
                .iter()
                .map(|e| e.employee.employee_id)
                .collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(report.employees[0].employee.name, "Asha");
        assert_eq!(report.employees[1].employee.department.as_deref(), Some("Finance"));
        assert_eq!(report.employees[0].result.leave_types_taken.casual_leave, 2);
        assert!(report.employees.iter().all(|e| !e.replayed));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].employee_id, 9);
        assert_eq!(report.failures[0].error, "NotFound");

        // viewing the report again replays instead of charging twice
        let again = build_report(&engine, employees, period).await;
        assert!(again.employees.iter().all(|e| e.replayed));
        assert_eq!(
            again.employees[0].result.leave_balance,
            report.employees[0].result.leave_balance
        );
        assert_eq!(engine.store().ledger_len(), 2);
    }
}
