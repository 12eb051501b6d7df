use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    config::Config,
    model::{
        attendance::{AttendanceRecord, AttendanceStatus},
        employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus},
    },
    reconciliation::Period,
    utils::attendance_rules::{classify_check_in, office_now, working_time},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str =
    "id, employee_id, date, check_in, check_out, total_working_hour, late_time, status";

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Required for HR/admin listings
    #[schema(example = 1)]
    pub employee_id: Option<u64>,
    #[schema(example = "2026-11-01", value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(example = "2026-11-30", value_type = String, format = "date")]
    pub to: NaiveDate,
}

async fn todays_record(
    pool: &MySqlPool,
    employee_id: u64,
    today: NaiveDate,
) -> actix_web::Result<Option<AttendanceRecord>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?");
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(today)
        .fetch_optional(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch today's attendance"))
}

async fn records_between(
    pool: &MySqlPool,
    employee_id: u64,
    period: Period,
) -> actix_web::Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date BETWEEN ? AND ? ORDER BY date"
    );
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(employee_id)
        .bind(period.start())
        .bind(period.end())
        .fetch_all(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch attendance"))
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Existing record for today, or on approved leave", body = Object, example = json!({
            "message": "You are on leave today",
            "status": "on-leave"
        })),
        (status = 201, description = "Checked in", body = AttendanceRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let now = office_now(config.office_offset);
    let today = now.date();

    // 1️⃣ already checked in
    if let Some(record) = todays_record(pool.get_ref(), employee_id, today).await? {
        return Ok(HttpResponse::Ok().json(json!({
            "message": "Already checked in today",
            "attendance": record
        })));
    }

    // 2️⃣ approved leave covering today
    let on_leave: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM leave_requests
        WHERE employee_id = ?
        AND status = 'approved'
        AND start_date <= ?
        AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(today)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to check leave for today"))?;

    if on_leave > 0 {
        return Ok(HttpResponse::Ok().json(json!({
            "message": "You are on leave today",
            "status": AttendanceStatus::OnLeave
        })));
    }

    // 3️⃣ weekly off, present or late
    let outcome = classify_check_in(now, config.office_start, &config.weekly_off_days);
    let check_in = outcome.check_in_time(now);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, late_time, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(check_in)
    .bind(outcome.late_time())
    .bind(outcome.status())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(employee_id, status = %outcome.status(), "Checked in");
            Ok(HttpResponse::Created().json(AttendanceRecord {
                id: res.last_insert_id(),
                employee_id,
                date: today,
                check_in,
                check_out: None,
                total_working_hour: None,
                late_time: outcome.late_time(),
                status: outcome.status(),
            }))
        }

        // Concurrent check-in for the same day won the unique key
        Err(e) if is_constraint_violation(&e) => {
            warn!(employee_id, "Duplicate check-in");
            let record = todays_record(pool.get_ref(), employee_id, today).await?;
            Ok(HttpResponse::Ok().json(json!({
                "message": "Already checked in today",
                "attendance": record
            })))
        }

        Err(e) => Err(internal_error(e, "Check-in failed")),
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "total_working_hour": "8h 30m"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let now = office_now(config.office_offset);

    let open = todays_record(pool.get_ref(), employee_id, now.date())
        .await?
        .filter(|r| r.check_out.is_none())
        .and_then(|r| r.check_in.map(|check_in| (r.id, check_in)));

    let Some((id, check_in)) = open else {
        return Ok(bad_request("No active check-in found for today"));
    };

    let total: String = working_time(check_in, now);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, total_working_hour = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(&total)
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Check-out failed"))?;

    if result.rows_affected() == 0 {
        return Ok(bad_request("No active check-in found for today"));
    }

    info!(employee_id, total_working_hour = %total, "Checked out");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "check_out": now,
        "total_working_hour": total
    })))
}

async fn records_on(pool: &MySqlPool, date: NaiveDate) -> actix_web::Result<Vec<AttendanceRecord>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date = ? ORDER BY employee_id");
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch attendance for the day"))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnmarkedEmployee {
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct DayAttendance {
    #[schema(example = "2026-11-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub records: Vec<AttendanceRecord>,
    /// Active employees without a record for the day
    pub not_marked: Vec<UnmarkedEmployee>,
}

/// Active employees that have no record among `records`.
pub fn unmarked(active: &[Employee], records: &[AttendanceRecord]) -> Vec<UnmarkedEmployee> {
    active
        .iter()
        .filter(|e| e.status == EmployeeStatus::Active)
        .filter(|e| !records.iter().any(|r| r.employee_id == e.id))
        .map(|e| UnmarkedEmployee {
            employee_id: e.id,
            employee_code: e.employee_code.clone(),
            name: e.full_name(),
        })
        .collect()
}

fn range(query: &AttendanceQuery) -> Result<Period, HttpResponse> {
    Period::new(query.from, query.to).map_err(|e| bad_request(e.to_string()))
}

/// Attendance of the calling employee in a date range
#[utoipa::path(
    get,
    path = "/api/attendance/mine",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Records ordered by date", body = [AttendanceRecord]),
        (status = 400, description = "from is after to"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let period = match range(&query) {
        Ok(period) => period,
        Err(resp) => return Ok(resp),
    };

    let records = records_between(pool.get_ref(), employee_id, period).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Attendance of any employee in a date range (HR/admin)
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Records ordered by date", body = [AttendanceRecord]),
        (status = 400, description = "Missing employee_id or from is after to"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let Some(employee_id) = query.employee_id else {
        return Ok(bad_request("employee_id is required"));
    };

    let period = match range(&query) {
        Ok(period) => period,
        Err(resp) => return Ok(resp),
    };

    let records = records_between(pool.get_ref(), employee_id, period).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Manually trigger the auto check-out for today (admin)
#[utoipa::path(
    post,
    path = "/api/attendance/auto-checkout",
    responses(
        (status = 200, description = "Number of records closed", body = Object, example = json!({
            "closed": 3
        })),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn trigger_auto_checkout(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let now: NaiveDateTime = office_now(config.office_offset);
    let closed = crate::utils::auto_checkout::run_auto_checkout(pool.get_ref(), now)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Manual auto check-out failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(json!({ "closed": closed })))
}

/// Today's attendance of the calling employee
#[utoipa::path(
    get,
    path = "/api/attendance/today/mine",
    responses(
        (status = 200, body = AttendanceRecord),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "No attendance found for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;
    let today = office_now(config.office_offset).date();

    match todays_record(pool.get_ref(), employee_id, today).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Ok(not_found("No attendance found for today")),
    }
}

/// Today's records of everyone plus active employees who have not checked in (HR/admin)
#[utoipa::path(
    get,
    path = "/api/attendance/today/all",
    responses(
        (status = 200, body = DayAttendance),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn all_today(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let today = office_now(config.office_offset).date();

    let records = records_on(pool.get_ref(), today).await?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE status = ? ORDER BY id");
    let active = sqlx::query_as::<_, Employee>(&sql)
        .bind(EmployeeStatus::Active)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to list active employees"))?;

    let not_marked = unmarked(&active, &records);

    Ok(HttpResponse::Ok().json(DayAttendance {
        date: today,
        records,
        not_marked,
    }))
}

/// All attendance records of one day (HR/admin)
#[utoipa::path(
    get,
    path = "/api/attendance/date/{date}",
    params(("date" = String, Path, description = "Day as YYYY-MM-DD")),
    responses(
        (status = 200, description = "Records ordered by employee", body = [AttendanceRecord]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_on(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<NaiveDate>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let records = records_on(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(id: u64, status: EmployeeStatus) -> Employee {
        Employee {
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
            sick_leave: 4,
            casual_leave: 8,
            total_leave_taken: 0,
            status,
        }
    }

    fn record(employee_id: u64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: employee_id * 10,
            employee_id,
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            check_in: None,
            check_out: None,
            total_working_hour: None,
            late_time: None,
            status,
        }
    }

    #[test]
    fn unmarked_lists_active_employees_without_a_record() {
        let employees = vec![
            employee(1, EmployeeStatus::Active),
            employee(2, EmployeeStatus::Active),
            employee(3, EmployeeStatus::Inactive),
            employee(4, EmployeeStatus::Active),
        ];
        let records = vec![
            record(1, AttendanceStatus::Present),
            record(4, AttendanceStatus::WeeklyOff),
        ];

        let missing = unmarked(&employees, &records);
        assert_eq!(
            missing.iter().map(|e| e.employee_id).collect::<Vec<_>>(),
            vec![2]
        );
        assert_eq!(missing[0].employee_code, "EMP-002");
        assert_eq!(missing[0].name, "Employee 2");
    }
}
