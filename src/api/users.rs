use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    api::{bad_request, internal_error, not_found},
    auth::auth::AuthUser,
    model::role::Role,
};

/// Login account without its password hash.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct UserSummary {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "hr.manager")]
    pub username: String,
    /// 1 = admin, 2 = hr, 3 = employee
    #[schema(example = 2)]
    pub role_id: u8,
    #[schema(example = 1, nullable = true)]
    pub employee_id: Option<u64>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub last_login_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateRole {
    /// 1 = admin, 2 = hr, 3 = employee
    #[schema(example = 2)]
    pub role_id: u8,
}

/// Admins may not change or delete their own account, so one admin always remains.
fn check_target(auth: &AuthUser, user_id: u64) -> Result<(), &'static str> {
    if auth.user_id == user_id {
        return Err("You cannot change your own account");
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, body = [UserSummary]),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT id, username, role_id, employee_id, is_active, last_login_at FROM users ORDER BY id",
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to list users"))?;

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    put,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    request_body = UpdateRole,
    responses(
        (status = 200, description = "Role updated, existing refresh tokens revoked"),
        (status = 400, description = "Unknown role or own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user_role(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateRole>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    if let Err(msg) = check_target(&auth, user_id) {
        return Ok(bad_request(msg));
    }
    let Some(role) = Role::from_id(payload.role_id) else {
        return Ok(bad_request("Unknown role"));
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| internal_error(e, "Failed to start transaction"))?;

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to check user"))?;
    if exists == 0 {
        return Ok(not_found("User not found"));
    }

    sqlx::query("UPDATE users SET role_id = ? WHERE id = ?")
        .bind(role.id())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to update role"))?;

    // the old role lives on in issued tokens; force a fresh login
    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| internal_error(e, "Failed to revoke refresh tokens"))?;

    tx.commit()
        .await
        .map_err(|e| internal_error(e, "Failed to commit role change"))?;

    info!(user_id, role_id = role.id(), by = auth.user_id, "User role updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "User role updated",
        "role_id": role.id()
    })))
}

#[utoipa::path(
    delete,
    path = "/api/users/{user_id}",
    params(("user_id" = u64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    if let Err(msg) = check_target(&auth, user_id) {
        warn!(user_id, "Admin tried to delete own account");
        return Ok(bad_request(msg));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to delete user"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("User not found"));
    }

    info!(user_id, by = auth.user_id, "User deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "User deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_cannot_touch_their_own_account() {
        let admin = AuthUser {
            user_id: 1,
            username: "admin".into(),
            role: Role::Admin,
            employee_id: None,
        };
        assert!(check_target(&admin, 1).is_err());
        assert!(check_target(&admin, 2).is_ok());
    }
}
