use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    config::Config,
    model::employee::{EMPLOYEE_COLUMNS, Employee, EmployeeStatus},
    reconciliation::{ledger::LeaveBalance, mysql::MySqlStore, store::EmployeeStore},
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

/// Columns an update payload may touch. Balances go through the leave-balance endpoint.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "designation",
    "hire_date",
    "salary",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe", nullable = true)]
    pub last_name: Option<String>,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,
    #[schema(example = 1, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(example = "Engineer", nullable = true)]
    pub designation: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String, nullable = true)]
    pub hire_date: Option<NaiveDate>,
    #[schema(example = 50000.0, nullable = true)]
    pub salary: Option<f64>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
    /// Matches first name, last name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeaveBalance {
    #[schema(example = 4)]
    pub sick_leave: u32,
    #[schema(example = 8)]
    pub casual_leave: u32,
}

enum FilterValue {
    U64(u64),
    Str(String),
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 1
        })),
        (status = 409, description = "Duplicate employee code or email, or unknown department"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if payload.employee_code.trim().is_empty() || payload.first_name.trim().is_empty() {
        return Ok(bad_request("employee_code and first_name are required"));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, designation,
         hire_date, salary, sick_leave, casual_leave, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(&payload.last_name)
    .bind(payload.email.trim().to_lowercase())
    .bind(&payload.phone)
    .bind(payload.department_id)
    .bind(&payload.designation)
    .bind(payload.hire_date)
    .bind(payload.salary)
    .bind(config.default_sick_leave)
    .bind(config.default_casual_leave)
    .bind(EmployeeStatus::Active)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => {
            info!(employee_id = res.last_insert_id(), "Employee created");
            Ok(HttpResponse::Created().json(json!({
                "message": "Employee created successfully",
                "id": res.last_insert_id()
            })))
        }
        Err(e) if is_constraint_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "Employee code or email already exists, or department is unknown"
        }))),
        Err(e) => {
            error!(error = %e, "Failed to Create Employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Something went wrong, Contact with system admin"
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = Vec::new();
    let mut bindings: Vec<FilterValue> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(FilterValue::U64(department_id));
    }

    if let Some(status) = query.status {
        conditions.push("status = ?");
        bindings.push(FilterValue::Str(status.to_string()));
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search.trim());
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like.clone()));
        bindings.push(FilterValue::Str(like));
    }

    let where_clause = if conditions.is_empty() {
        "".to_string()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) as total FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            FilterValue::U64(v) => count_query.bind(*v),
            FilterValue::Str(s) => count_query.bind(s.as_str()),
        };
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count employees");
        ErrorInternalServerError("Database error")
    })?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT {} FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        EMPLOYEE_COLUMNS, where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = match b {
            FilterValue::U64(v) => data_query.bind(*v),
            FilterValue::Str(s) => data_query.bind(s.as_str()),
        };
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch employees");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body(content = Object, description = "Subset of employee columns", example = json!({
        "designation": "Senior Engineer",
        "salary": 65000.0
    })),
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Empty payload or field not updatable"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    if let Some(status) = body.get("status").and_then(Value::as_str) {
        if status.parse::<EmployeeStatus>().is_err() {
            return Ok(bad_request(format!("Unknown status '{status}'")));
        }
    }

    let update = build_update_sql("employees", &body, UPDATABLE_COLUMNS, "id", employee_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(affected) => affected,
        Err(e) if is_constraint_violation(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": "Employee code or email already exists, or department is unknown"
            })));
        }
        Err(e) => return Err(internal_error(e, "Failed to update employee")),
    };

    if affected == 0 {
        // MySQL reports zero rows when nothing changed, so check existence
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(pool.get_ref())
            .await
            .map_err(|e| internal_error(e, "Failed to check employee"))?;
        if exists == 0 {
            return Ok(not_found("Employee not found"));
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Overwrite an employee's remaining leave balances
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/leave-balance",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    request_body = UpdateLeaveBalance,
    responses(
        (status = 200, description = "Balances updated", body = LeaveBalance),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_leave_balance(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    body: web::Json<UpdateLeaveBalance>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();
    let balance = LeaveBalance {
        sick_leave: body.sick_leave,
        casual_leave: body.casual_leave,
    };

    let updated = store
        .update_balances(employee_id, balance)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to update leave balance");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if !updated {
        return Ok(not_found("Employee not found"));
    }

    info!(
        employee_id,
        sick_leave = balance.sick_leave,
        casual_leave = balance.casual_leave,
        by = auth.user_id,
        "Leave balance overwritten"
    );
    Ok(HttpResponse::Ok().json(balance))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query(r#"DELETE FROM employees WHERE id = ?"#)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            if res.rows_affected() == 0 {
                return Ok(not_found("Employee not found"));
            }

            info!(employee_id, "Employee deleted");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }

        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");

            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Employees may only read their own profile"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = path.into_inner();

    if auth.require_hr_or_admin().is_err() && auth.employee_id != Some(employee_id) {
        return Err(actix_web::error::ErrorForbidden("HR/Admin only"));
    }

    let employee = store.get(employee_id).await.map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch employee");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(not_found("Employee not found")),
    }
}

/// Own employee profile with the department name resolved.
#[derive(Serialize, ToSchema)]
pub struct MyProfile {
    pub employee: Employee,
    #[schema(example = "Engineering", nullable = true)]
    pub department: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/myprofile",
    responses(
        (status = 200, body = MyProfile),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn my_profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<MySqlStore>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let employee = store.get(employee_id).await.map_err(|e| {
        error!(error = %e, employee_id, "Failed to fetch own profile");
        ErrorInternalServerError("Internal Server Error")
    })?;
    let Some(employee) = employee else {
        return Ok(not_found("Profile not found"));
    };

    let department = match employee.department_id {
        Some(department_id) => {
            sqlx::query_scalar::<_, String>("SELECT name FROM departments WHERE id = ?")
                .bind(department_id)
                .fetch_optional(pool.get_ref())
                .await
                .map_err(|e| internal_error(e, "Failed to fetch department name"))?
        }
        None => None,
    };

    Ok(HttpResponse::Ok().json(MyProfile {
        employee,
        department,
    }))
}
