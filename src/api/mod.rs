pub mod attendance;
pub mod dashboard;
pub mod department;
pub mod employee;
pub mod holiday;
pub mod leave_request;
pub mod payroll;
pub mod performance;
pub mod reconciliation;
pub mod users;

use actix_web::{HttpResponse, error::ErrorInternalServerError};
use serde_json::json;

/// MySQL error code for duplicate keys and failed foreign keys.
pub const CONSTRAINT_VIOLATION: &str = "23000";

pub fn is_constraint_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(CONSTRAINT_VIOLATION))
}

/// Logs a database error and turns it into a 500.
pub fn internal_error(e: sqlx::Error, what: &'static str) -> actix_web::Error {
    tracing::error!(error = %e, "{what}");
    ErrorInternalServerError("Internal Server Error")
}

pub fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": message }))
}

pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": message.into() }))
}
