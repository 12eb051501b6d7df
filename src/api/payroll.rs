use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    model::payroll::{Payroll, PayrollStatus, net_salary},
};

const PAYROLL_COLUMNS: &str =
    "id, employee_id, salary_month, base_salary, bonus, deductions, net_salary, status";

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    /// Any day of the salary month; stored as the first of the month
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub salary_month: NaiveDate,

    #[schema(example = 50000.0)]
    pub base_salary: f64,

    #[schema(example = 5000.0)]
    #[serde(default)]
    pub bonus: f64,

    #[schema(example = 2000.0)]
    #[serde(default)]
    pub deductions: f64,

    #[serde(default)]
    pub status: PayrollStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,

    #[schema(example = 6000.0)]
    pub bonus: Option<f64>,

    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,

    pub status: Option<PayrollStatus>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,

    pub status: Option<PayrollStatus>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn validate_amounts(base_salary: f64, bonus: f64, deductions: f64) -> Result<(), &'static str> {
    if [base_salary, bonus, deductions]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err("Amounts must be non-negative numbers");
    }
    Ok(())
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> actix_web::Result<Option<Payroll>> {
    let sql = format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?");
    sqlx::query_as::<_, Payroll>(&sql)
        .bind(payroll_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch payroll"))
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created"),
        (status = 400, description = "Negative amount"),
        (status = 401),
        (status = 403),
        (status = 409, description = "Payroll already exists for that month, or unknown employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if let Err(msg) = validate_amounts(payload.base_salary, payload.bonus, payload.deductions) {
        return Ok(bad_request(msg));
    }

    let net = net_salary(payload.base_salary, payload.bonus, payload.deductions);
    let salary_month = first_of_month(payload.salary_month);

    let result = sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, salary_month, base_salary, bonus, deductions, net_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(salary_month)
    .bind(payload.base_salary)
    .bind(payload.bonus)
    .bind(payload.deductions)
    .bind(net)
    .bind(payload.status)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(employee_id = payload.employee_id, %salary_month, "Payroll created");
            Ok(HttpResponse::Created().json(json!({
                "message": "Payroll created successfully",
                "id": res.last_insert_id(),
                "net_salary": net
            })))
        }
        Err(e) if is_constraint_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Payroll already exists for this month, or employee is unknown"
        }))),
        Err(e) => Err(internal_error(e, "Failed to create payroll")),
    }
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated", body = Payroll),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let payroll_id = path.into_inner();

    let Some(current) = fetch_payroll(pool.get_ref(), payroll_id).await? else {
        return Ok(not_found("Payroll record not found"));
    };

    let base_salary = body.base_salary.unwrap_or(current.base_salary);
    let bonus = body.bonus.unwrap_or(current.bonus);
    let deductions = body.deductions.unwrap_or(current.deductions);
    let status = body.status.unwrap_or(current.status);

    if let Err(msg) = validate_amounts(base_salary, bonus, deductions) {
        return Ok(bad_request(msg));
    }

    let net = net_salary(base_salary, bonus, deductions);

    sqlx::query(
        r#"
        UPDATE payroll
        SET base_salary = ?, bonus = ?, deductions = ?, net_salary = ?, status = ?
        WHERE id = ?
        "#,
    )
    .bind(base_salary)
    .bind(bonus)
    .bind(deductions)
    .bind(net)
    .bind(status)
    .bind(payroll_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to update payroll"))?;

    Ok(HttpResponse::Ok().json(Payroll {
        base_salary,
        bonus,
        deductions,
        net_salary: net,
        status,
        ..current
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, body = Payroll),
        (status = 403),
        (status = 404)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let payroll_id = path.into_inner();

    match fetch_payroll(pool.get_ref(), payroll_id).await? {
        Some(p) if auth.require_hr_or_admin().is_ok() || auth.employee_id == Some(p.employee_id) => {
            Ok(HttpResponse::Ok().json(p))
        }
        Some(_) => Err(actix_web::error::ErrorForbidden("HR/Admin only")),
        None => Ok(not_found("Payroll not found")),
    }
}

#[utoipa::path(
    get,
    path = "/api/payroll/mine",
    responses(
        (status = 200, description = "Own payrolls, newest month first", body = [Payroll]),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll WHERE employee_id = ? ORDER BY salary_month DESC"
    );
    let data = sqlx::query_as::<_, Payroll>(&sql)
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch own payrolls"))?;

    Ok(HttpResponse::Ok().json(data))
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{payroll_id}",
    params(
        ("payroll_id" = u64, Path, description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll deleted"),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();

    let result = sqlx::query("DELETE FROM payroll WHERE id = ?")
        .bind(payroll_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to delete payroll"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Payroll not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payroll deleted"
    })))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Optional filters bind as NULL when absent
    let filter = "WHERE (? IS NULL OR employee_id = ?) AND (? IS NULL OR status = ?)";
    let status = query.status.map(|s| s.to_string());

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM payroll {filter}"))
        .bind(query.employee_id)
        .bind(query.employee_id)
        .bind(status.as_deref())
        .bind(status.as_deref())
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to count payrolls"))?;

    let data_sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll {filter} ORDER BY salary_month DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = sqlx::query_as::<_, Payroll>(&data_sql)
        .bind(query.employee_id)
        .bind(query.employee_id)
        .bind(status.as_deref())
        .bind(status.as_deref())
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch payroll list"))?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salary_month_is_normalized_to_the_first() {
        let d = NaiveDate::from_ymd_opt(2026, 2, 17).unwrap();
        assert_eq!(first_of_month(d), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    }

    #[test]
    fn amounts_must_be_non_negative() {
        assert!(validate_amounts(50000.0, 0.0, 0.0).is_ok());
        assert!(validate_amounts(50000.0, -1.0, 0.0).is_err());
        assert!(validate_amounts(f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn net_salary_adds_bonus_and_subtracts_deductions() {
        assert_eq!(net_salary(50000.0, 5000.0, 2000.0), 53000.0);
    }
}
