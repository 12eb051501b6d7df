use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::{
    api::internal_error,
    auth::auth::AuthUser,
    config::Config,
    model::{attendance::AttendanceStatus, employee::EmployeeStatus, leave_request::LeaveStatus},
    utils::attendance_rules::office_now,
};

/// Headcount and today's attendance of one department. Departments without
/// employees are listed with zeros.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct DepartmentSummary {
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = "Engineering")]
    pub department: String,
    #[schema(example = 12)]
    pub employees: i64,
    /// Present or late today
    #[schema(example = 10)]
    pub present_today: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Dashboard {
    #[schema(example = "2026-11-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub total_departments: usize,
    /// Employees not marked inactive, with or without a department
    pub total_employees: i64,
    /// Sum over departments
    pub present_today: i64,
    pub pending_leave_requests: i64,
    pub departments: Vec<DepartmentSummary>,
}

impl Dashboard {
    pub fn new(
        date: NaiveDate,
        departments: Vec<DepartmentSummary>,
        without_department: i64,
        pending_leave_requests: i64,
    ) -> Self {
        Self {
            date,
            total_departments: departments.len(),
            total_employees: departments.iter().map(|d| d.employees).sum::<i64>()
                + without_department,
            present_today: departments.iter().map(|d| d.present_today).sum(),
            pending_leave_requests,
            departments,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses(
        (status = 200, body = Dashboard),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let today = office_now(config.office_offset).date();

    let departments = sqlx::query_as::<_, DepartmentSummary>(
        r#"
        SELECT d.id AS department_id,
            d.name AS department,
            COUNT(DISTINCT e.id) AS employees,
            COUNT(DISTINCT a.employee_id) AS present_today
        FROM departments d
        LEFT JOIN employees e ON e.department_id = d.id AND e.status <> ?
        LEFT JOIN attendance a ON a.employee_id = e.id AND a.date = ? AND a.status IN (?, ?)
        GROUP BY d.id, d.name
        ORDER BY d.name
        "#,
    )
    .bind(EmployeeStatus::Inactive)
    .bind(today)
    .bind(AttendanceStatus::Present)
    .bind(AttendanceStatus::Late)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to summarize departments"))?;

    let without_department = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM employees WHERE department_id IS NULL AND status <> ?",
    )
    .bind(EmployeeStatus::Inactive)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to count unassigned employees"))?;

    let pending = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leave_requests WHERE status = ?")
        .bind(LeaveStatus::Pending)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to count pending leave"))?;

    Ok(HttpResponse::Ok().json(Dashboard::new(today, departments, without_department, pending)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn department(id: u64, name: &str, employees: i64, present_today: i64) -> DepartmentSummary {
        DepartmentSummary {
            department_id: id,
            department: name.into(),
            employees,
            present_today,
        }
    }

    #[test]
    fn totals_include_unassigned_employees() {
        let date = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        let dashboard = Dashboard::new(
            date,
            vec![
                department(1, "Engineering", 12, 10),
                department(2, "Finance", 0, 0),
            ],
            3,
            4,
        );

        assert_eq!(dashboard.total_departments, 2);
        assert_eq!(dashboard.total_employees, 15);
        assert_eq!(dashboard.present_today, 10);
        assert_eq!(dashboard.pending_leave_requests, 4);
    }
}
