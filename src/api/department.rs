use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    model::department::Department,
};

#[derive(Deserialize, ToSchema)]
pub struct DepartmentPayload {
    #[schema(example = "Engineering")]
    pub name: String,
    #[schema(example = "Product engineering", nullable = true)]
    pub description: Option<String>,
}

fn duplicate() -> HttpResponse {
    HttpResponse::Conflict().json(json!({
        "message": "Department name already exists"
    }))
}

#[utoipa::path(
    get,
    path = "/api/department",
    responses((status = 200, body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let departments =
        sqlx::query_as::<_, Department>("SELECT id, name, description FROM departments ORDER BY name")
            .fetch_all(pool.get_ref())
            .await
            .map_err(|e| internal_error(e, "Failed to list departments"))?;

    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    get,
    path = "/api/department/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, body = Department),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn get_department(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let department_id = path.into_inner();

    let department =
        sqlx::query_as::<_, Department>("SELECT id, name, description FROM departments WHERE id = ?")
            .bind(department_id)
            .fetch_optional(pool.get_ref())
            .await
            .map_err(|e| internal_error(e, "Failed to fetch department"))?;

    match department {
        Some(d) => Ok(HttpResponse::Ok().json(d)),
        None => Ok(not_found("Department not found")),
    }
}

#[utoipa::path(
    post,
    path = "/api/department",
    request_body = DepartmentPayload,
    responses(
        (status = 201, body = Department),
        (status = 409, description = "Department name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(bad_request("Department name is required"));
    }

    let result = sqlx::query("INSERT INTO departments (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(&payload.description)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            info!(department_id = res.last_insert_id(), name, "Department created");
            Ok(HttpResponse::Created().json(Department {
                id: res.last_insert_id(),
                name: name.to_string(),
                description: payload.description.clone(),
            }))
        }
        Err(e) if is_constraint_violation(&e) => Ok(duplicate()),
        Err(e) => Err(internal_error(e, "Failed to create department")),
    }
}

#[utoipa::path(
    put,
    path = "/api/department/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    request_body = DepartmentPayload,
    responses(
        (status = 200, body = Department),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Department name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let department_id = path.into_inner();
    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(bad_request("Department name is required"));
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM departments WHERE id = ?")
        .bind(department_id)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to check department"))?;
    if exists == 0 {
        return Ok(not_found("Department not found"));
    }

    let result = sqlx::query("UPDATE departments SET name = ?, description = ? WHERE id = ?")
        .bind(name)
        .bind(&payload.description)
        .bind(department_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(Department {
            id: department_id,
            name: name.to_string(),
            description: payload.description.clone(),
        })),
        Err(e) if is_constraint_violation(&e) => Ok(duplicate()),
        Err(e) => Err(internal_error(e, "Failed to update department")),
    }
}

#[utoipa::path(
    delete,
    path = "/api/department/{department_id}",
    params(("department_id" = u64, Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department deleted; employees keep no department"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let department_id = path.into_inner();

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(department_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to delete department"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Department not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Department deleted"
    })))
}
