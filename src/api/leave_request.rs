use crate::{
    api::{bad_request, internal_error, not_found},
    auth::auth::AuthUser,
    config::Config,
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        leave_request::{LeaveRequest, LeaveStatus, LeaveType, leave_span},
    },
    reconciliation::Period,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const LEAVE_COLUMNS: &str =
    "id, employee_id, leave_type, start_date, end_date, reason, status, approved_by, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-02", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sickLeave")]
    pub leave_type: LeaveType,
    #[schema(example = "Fever", nullable = true)]
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = "sickLeave")]
    /// Filter by leave type
    pub leave_type: Option<LeaveType>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
}

/// Why a request is refused before it reaches storage.
#[derive(Debug, PartialEq, Eq)]
pub enum LeaveRefusal {
    InvalidRange,
    InsufficientBalance { leave_type: LeaveType, remaining: u32 },
    MonthlyLimit { limit: u32 },
}

impl LeaveRefusal {
    pub fn message(&self) -> String {
        match self {
            LeaveRefusal::InvalidRange => "start_date cannot be after end_date".to_string(),
            LeaveRefusal::InsufficientBalance {
                leave_type,
                remaining,
            } => format!("Insufficient {leave_type} balance: {remaining} day(s) remaining"),
            LeaveRefusal::MonthlyLimit { limit } => {
                format!("You can't take more than {limit} leave days in a month")
            }
        }
    }
}

/// Checks a new request against the employee's balance and the monthly leave cap.
///
/// `days_already_in_month` counts non-rejected leave days starting in the request's start month.
pub fn check_new_leave(
    employee: &Employee,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    days_already_in_month: u32,
    monthly_limit: u32,
) -> Result<u32, LeaveRefusal> {
    if start > end {
        return Err(LeaveRefusal::InvalidRange);
    }
    let days = leave_span(start, end);

    if let Some(remaining) = employee.balance().remaining(leave_type) {
        if remaining < days {
            return Err(LeaveRefusal::InsufficientBalance {
                leave_type,
                remaining,
            });
        }
    }

    if days_already_in_month.saturating_add(days) > monthly_limit {
        return Err(LeaveRefusal::MonthlyLimit {
            limit: monthly_limit,
        });
    }

    Ok(days)
}

/// Checks a pending request can be approved.
///
/// `approved_in_month` counts approved requests starting in the same month.
pub fn check_approval(
    employee: &Employee,
    leave_type: LeaveType,
    approved_in_month: u32,
    monthly_limit: u32,
) -> Result<(), LeaveRefusal> {
    if leave_type.is_paid() && employee.balance().remaining(leave_type) == Some(0) {
        return Err(LeaveRefusal::InsufficientBalance {
            leave_type,
            remaining: 0,
        });
    }

    if approved_in_month >= monthly_limit {
        return Err(LeaveRefusal::MonthlyLimit {
            limit: monthly_limit,
        });
    }

    Ok(())
}

/// Employee profile recorded as the approver. Accounts without a profile leave it empty.
pub fn approver(auth: &AuthUser) -> Option<u64> {
    auth.employee_id
}

fn month_bounds(date: NaiveDate) -> actix_web::Result<Period> {
    Period::month_of(date)
        .ok_or_else(|| actix_web::error::ErrorBadRequest("Date out of supported range"))
}

async fn load_employee(pool: &MySqlPool, employee_id: u64) -> actix_web::Result<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    sqlx::query_as::<_, Employee>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch employee"))
}

/* =========================
Create leave request
========================= */
/// Swagger doc for create_leave endpoint
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "status": "pending"
         })
        ),
        (status = 400, description = "Invalid range, insufficient balance or monthly cap reached"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    // 1️⃣ validate dates
    if payload.start_date > payload.end_date {
        return Ok(bad_request(LeaveRefusal::InvalidRange.message()));
    }

    let Some(employee) = load_employee(pool.get_ref(), employee_id).await? else {
        return Ok(not_found("Employee not found"));
    };

    // 2️⃣ leave days already requested this month
    let month = month_bounds(payload.start_date)?;
    let already: i64 = sqlx::query_scalar(
        r#"
        SELECT CAST(COALESCE(SUM(DATEDIFF(end_date, start_date) + 1), 0) AS SIGNED)
        FROM leave_requests
        WHERE employee_id = ?
        AND status <> 'rejected'
        AND start_date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(month.start())
    .bind(month.end())
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to sum monthly leave"))?;

    // 3️⃣ balance and monthly cap
    let days = match check_new_leave(
        &employee,
        payload.leave_type,
        payload.start_date,
        payload.end_date,
        u32::try_from(already).unwrap_or(u32::MAX),
        config.max_leave_days_per_month,
    ) {
        Ok(days) => days,
        Err(refusal) => {
            info!(employee_id, ?refusal, "Leave request refused");
            return Ok(bad_request(refusal.message()));
        }
    };

    // 4️⃣ insert request
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type, start_date, end_date, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.leave_type)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to create leave request"))?;

    info!(employee_id, leave_id = result.last_insert_id(), days, "Leave requested");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": result.last_insert_id(),
        "status": LeaveStatus::Pending
    })))
}

async fn fetch_pending_for_update(
    tx: &mut Transaction<'_, MySql>,
    leave_id: u64,
) -> actix_web::Result<Option<LeaveRequest>> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
    let leave = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave request"))?;

    Ok(leave.filter(|l| l.status == LeaveStatus::Pending))
}

/* =========================
Approve leave (HR/Admin)
========================= */
/// Swagger doc for approve_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 400, description = "Leave request not found, already processed, or not coverable", body = Object, example = json!({
            "message": "Leave request not found or already processed"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| internal_error(e, "Failed to start transaction"))?;

    let Some(leave) = fetch_pending_for_update(&mut tx, leave_id).await? else {
        return Ok(bad_request("Leave request not found or already processed"));
    };

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ? FOR UPDATE");
    let Some(employee) = sqlx::query_as::<_, Employee>(&sql)
        .bind(leave.employee_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch employee"))?
    else {
        return Ok(not_found("Employee not found"));
    };

    let month = month_bounds(leave.start_date)?;
    let approved_in_month: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM leave_requests
        WHERE employee_id = ?
        AND status = 'approved'
        AND start_date BETWEEN ? AND ?
        "#,
    )
    .bind(leave.employee_id)
    .bind(month.start())
    .bind(month.end())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| internal_error(e, "Failed to count approved leave"))?;

    if let Err(refusal) = check_approval(
        &employee,
        leave.leave_type,
        u32::try_from(approved_in_month).unwrap_or(u32::MAX),
        config.max_leave_days_per_month,
    ) {
        warn!(leave_id, ?refusal, "Approval refused");
        return Ok(bad_request(refusal.message()));
    }

    sqlx::query("UPDATE leave_requests SET status = ?, approved_by = ? WHERE id = ?")
        .bind(LeaveStatus::Approved)
        .bind(approver(&auth))
        .bind(leave_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Approve leave failed"))?;

    sqlx::query("UPDATE employees SET total_leave_taken = total_leave_taken + ? WHERE id = ?")
        .bind(leave.days())
        .bind(leave.employee_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to update leave total"))?;

    tx.commit()
        .await
        .map_err(|e| internal_error(e, "Failed to commit approval"))?;

    info!(
        leave_id,
        employee_id = leave.employee_id,
        approved_by = ?approver(&auth),
        "Leave approved"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved"
    })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
/// Swagger doc for reject_leave endpoint
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Leave request not found or already processed", body = Object, example = json!({
            "message": "Leave request not found or already processed"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(LeaveStatus::Rejected)
    .bind(leave_id)
    .bind(LeaveStatus::Pending)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Reject leave failed"))?;

    if result.rows_affected() == 0 {
        return Ok(bad_request("Leave request not found or already processed"));
    }

    info!(leave_id, by = auth.user_id, "Leave rejected");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected"
    })))
}

/// Delete a pending leave request
#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to delete")
    ),
    responses(
        (status = 200, description = "Leave request deleted"),
        (status = 400, description = "Leave request not found or already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = ?")
        .bind(leave_id)
        .bind(LeaveStatus::Pending)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Delete leave failed"))?;

    if result.rows_affected() == 0 {
        return Ok(bad_request("Leave request not found or already processed"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request deleted"
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    let leave = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(leave_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave request"))?;

    match leave {
        Some(data)
            if auth.require_hr_or_admin().is_ok() || auth.employee_id == Some(data.employee_id) =>
        {
            Ok(HttpResponse::Ok().json(data))
        }
        Some(_) => Err(actix_web::error::ErrorForbidden("HR/Admin only")),
        None => Ok(not_found("Leave request not found")),
    }
}

/// Leave requests of the calling employee
#[utoipa::path(
    get,
    path = "/api/leave/mine",
    responses(
        (status = 200, description = "Own leave requests, newest first", body = [LeaveRequest]),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn my_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE employee_id = ? ORDER BY start_date DESC, id DESC"
    );
    let leaves = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch own leave list"))?;

    Ok(HttpResponse::Ok().json(leaves))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    if let Some(leave_type) = query.leave_type {
        where_sql.push_str(" AND leave_type = ?");
        args.push(FilterValue::Str(leave_type.to_string()));
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(s.as_str()),
        };
    }

    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to count leave requests"))?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        r#"
        SELECT {}
        FROM leave_requests
        {}
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
        LEAVE_COLUMNS, where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in &args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(*v),
            FilterValue::Str(s) => data_q.bind(s.as_str()),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch leave list"))?;

    // -------------------------
    // Response
    // -------------------------
    let response = LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    };

    Ok(HttpResponse::Ok().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{employee::EmployeeStatus, role::Role};

    fn employee(sick_leave: u32, casual_leave: u32) -> Employee {
        Employee {
            id: 1,
            employee_code: "EMP-001".into(),
            first_name: "Asha".into(),
            last_name: None,
            email: "asha@example.com".into(),
            phone: None,
            department_id: None,
            designation: None,
            hire_date: None,
            salary: None,
            sick_leave,
            casual_leave,
            total_leave_taken: 0,
            status: EmployeeStatus::Active,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    #[test]
    fn new_leave_needs_ordered_dates() {
        assert_eq!(
            check_new_leave(&employee(4, 8), LeaveType::SickLeave, d(5), d(4), 0, 4),
            Err(LeaveRefusal::InvalidRange)
        );
    }

    #[test]
    fn paid_leave_must_fit_the_balance() {
        assert_eq!(
            check_new_leave(&employee(1, 8), LeaveType::SickLeave, d(2), d(3), 0, 4),
            Err(LeaveRefusal::InsufficientBalance {
                leave_type: LeaveType::SickLeave,
                remaining: 1
            })
        );
        assert_eq!(
            check_new_leave(&employee(0, 0), LeaveType::Lwp, d(2), d(3), 0, 4),
            Ok(2)
        );
    }

    #[test]
    fn monthly_cap_counts_existing_days() {
        assert_eq!(
            check_new_leave(&employee(4, 8), LeaveType::CasualLeave, d(9), d(11), 2, 4),
            Err(LeaveRefusal::MonthlyLimit { limit: 4 })
        );
        assert_eq!(
            check_new_leave(&employee(4, 8), LeaveType::CasualLeave, d(9), d(10), 2, 4),
            Ok(2)
        );
    }

    #[test]
    fn approval_needs_a_positive_balance_and_room_in_the_month() {
        assert!(check_approval(&employee(0, 3), LeaveType::SickLeave, 0, 4).is_err());
        assert!(check_approval(&employee(0, 0), LeaveType::Lwp, 0, 4).is_ok());
        assert_eq!(
            check_approval(&employee(2, 2), LeaveType::CasualLeave, 4, 4),
            Err(LeaveRefusal::MonthlyLimit { limit: 4 })
        );
        assert!(check_approval(&employee(2, 2), LeaveType::CasualLeave, 3, 4).is_ok());
    }

    #[test]
    fn refusal_messages_name_the_problem() {
        let msg = LeaveRefusal::InsufficientBalance {
            leave_type: LeaveType::CasualLeave,
            remaining: 0,
        }
        .message();
        assert!(msg.contains("casualLeave"));
        assert!(LeaveRefusal::MonthlyLimit { limit: 4 }.message().contains('4'));
    }

    #[test]
    fn approver_is_the_employee_profile_not_the_account() {
        let hr = AuthUser {
            user_id: 7,
            username: "hr.manager".into(),
            role: Role::Hr,
            employee_id: Some(3),
        };
        assert_eq!(approver(&hr), Some(3));

        let admin = AuthUser {
            employee_id: None,
            role: Role::Admin,
            ..hr
        };
        assert_eq!(approver(&admin), None);
    }
}
