use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    model::performance::{PERFORMANCE_COLUMNS, PerformanceReview, valid_rating},
};

#[derive(Deserialize, ToSchema)]
pub struct CreateReview {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-Q3")]
    pub review_period: String,
    pub goals_achieved: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub feedback: Option<String>,
    #[schema(example = 4, minimum = 1, maximum = 5)]
    pub rating: Option<u8>,
}

/// Fields left out keep their stored value.
#[derive(Deserialize, ToSchema)]
pub struct UpdateReview {
    pub review_period: Option<String>,
    pub goals_achieved: Option<String>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub feedback: Option<String>,
    #[schema(minimum = 1, maximum = 5)]
    pub rating: Option<u8>,
}

impl UpdateReview {
    /// Applies the update on top of `current`.
    pub fn merge(self, current: PerformanceReview) -> PerformanceReview {
        PerformanceReview {
            review_period: self.review_period.unwrap_or(current.review_period),
            goals_achieved: self.goals_achieved.or(current.goals_achieved),
            strengths: self.strengths.or(current.strengths),
            weaknesses: self.weaknesses.or(current.weaknesses),
            feedback: self.feedback.or(current.feedback),
            rating: self.rating.or(current.rating),
            ..current
        }
    }
}

fn validate(review_period: &str, rating: Option<u8>) -> Result<(), &'static str> {
    if review_period.trim().is_empty() {
        return Err("review_period is required");
    }
    if !valid_rating(rating) {
        return Err("rating must be between 1 and 5");
    }
    Ok(())
}

async fn fetch_review(
    pool: &MySqlPool,
    review_id: u64,
) -> actix_web::Result<Option<PerformanceReview>> {
    let sql = format!("SELECT {PERFORMANCE_COLUMNS} FROM performance_reviews WHERE id = ?");
    sqlx::query_as::<_, PerformanceReview>(&sql)
        .bind(review_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| internal_error(e, "Failed to fetch performance review"))
}

#[utoipa::path(
    get,
    path = "/api/performance",
    responses(
        (status = 200, body = [PerformanceReview]),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn list_reviews(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let sql = format!(
        "SELECT {PERFORMANCE_COLUMNS} FROM performance_reviews ORDER BY created_at DESC, id DESC"
    );
    let reviews = sqlx::query_as::<_, PerformanceReview>(&sql)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to list performance reviews"))?;

    Ok(HttpResponse::Ok().json(reviews))
}

#[utoipa::path(
    get,
    path = "/api/performance/mine",
    responses(
        (status = 200, body = [PerformanceReview]),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn my_reviews(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_id()?;

    let sql = format!(
        "SELECT {PERFORMANCE_COLUMNS} FROM performance_reviews WHERE employee_id = ? ORDER BY created_at DESC, id DESC"
    );
    let reviews = sqlx::query_as::<_, PerformanceReview>(&sql)
        .bind(employee_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to fetch own performance reviews"))?;

    Ok(HttpResponse::Ok().json(reviews))
}

#[utoipa::path(
    get,
    path = "/api/performance/{review_id}",
    params(("review_id" = u64, Path, description = "Performance review ID")),
    responses(
        (status = 200, body = PerformanceReview),
        (status = 403),
        (status = 404, description = "Performance review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn get_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let review_id = path.into_inner();

    match fetch_review(pool.get_ref(), review_id).await? {
        Some(r) if auth.require_hr_or_admin().is_ok() || auth.employee_id == Some(r.employee_id) => {
            Ok(HttpResponse::Ok().json(r))
        }
        Some(_) => Err(actix_web::error::ErrorForbidden("HR/Admin only")),
        None => Ok(not_found("Performance review not found")),
    }
}

#[utoipa::path(
    post,
    path = "/api/performance",
    request_body = CreateReview,
    responses(
        (status = 201, body = PerformanceReview),
        (status = 400, description = "Missing period or rating out of range"),
        (status = 409, description = "Unknown employee")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn create_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateReview>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if let Err(msg) = validate(&payload.review_period, payload.rating) {
        return Ok(bad_request(msg));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO performance_reviews
            (employee_id, review_period, goals_achieved, strengths, weaknesses, feedback, rating, reviewed_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.review_period.trim())
    .bind(&payload.goals_achieved)
    .bind(&payload.strengths)
    .bind(&payload.weaknesses)
    .bind(&payload.feedback)
    .bind(payload.rating)
    .bind(auth.employee_id)
    .execute(pool.get_ref())
    .await;

    let review_id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_constraint_violation(&e) => {
            return Ok(HttpResponse::Conflict().json(json!({
                "message": "Employee does not exist"
            })));
        }
        Err(e) => return Err(internal_error(e, "Failed to create performance review")),
    };

    info!(review_id, employee_id = payload.employee_id, "Performance review created");

    match fetch_review(pool.get_ref(), review_id).await? {
        Some(review) => Ok(HttpResponse::Created().json(review)),
        None => Ok(not_found("Performance review not found")),
    }
}

#[utoipa::path(
    put,
    path = "/api/performance/{review_id}",
    params(("review_id" = u64, Path, description = "Performance review ID")),
    request_body = UpdateReview,
    responses(
        (status = 200, body = PerformanceReview),
        (status = 400, description = "Empty period or rating out of range"),
        (status = 404, description = "Performance review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn update_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateReview>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let review_id = path.into_inner();

    let Some(current) = fetch_review(pool.get_ref(), review_id).await? else {
        return Ok(not_found("Performance review not found"));
    };

    let review = payload.into_inner().merge(current);
    if let Err(msg) = validate(&review.review_period, review.rating) {
        return Ok(bad_request(msg));
    }

    sqlx::query(
        r#"
        UPDATE performance_reviews
        SET review_period = ?, goals_achieved = ?, strengths = ?, weaknesses = ?, feedback = ?, rating = ?
        WHERE id = ?
        "#,
    )
    .bind(review.review_period.trim())
    .bind(&review.goals_achieved)
    .bind(&review.strengths)
    .bind(&review.weaknesses)
    .bind(&review.feedback)
    .bind(review.rating)
    .bind(review_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| internal_error(e, "Failed to update performance review"))?;

    Ok(HttpResponse::Ok().json(review))
}

#[utoipa::path(
    delete,
    path = "/api/performance/{review_id}",
    params(("review_id" = u64, Path, description = "Performance review ID")),
    responses(
        (status = 200, description = "Performance review deleted"),
        (status = 404, description = "Performance review not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Performance"
)]
pub async fn delete_review(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let review_id = path.into_inner();

    let result = sqlx::query("DELETE FROM performance_reviews WHERE id = ?")
        .bind(review_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to delete performance review"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Performance review not found"));
    }

    info!(review_id, "Performance review deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Performance review deleted"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> PerformanceReview {
        PerformanceReview {
            id: 1,
            employee_id: 10,
            review_period: "2026-Q2".into(),
            goals_achieved: Some("Onboarded two hires".into()),
            strengths: None,
            weaknesses: None,
            feedback: Some("Keep it up".into()),
            rating: Some(3),
            reviewed_by: Some(2),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn update_keeps_fields_it_does_not_name() {
        let update = UpdateReview {
            review_period: None,
            goals_achieved: None,
            strengths: Some("Mentoring".into()),
            weaknesses: None,
            feedback: None,
            rating: Some(5),
        };

        let merged = update.merge(stored());
        assert_eq!(merged.review_period, "2026-Q2");
        assert_eq!(merged.goals_achieved.as_deref(), Some("Onboarded two hires"));
        assert_eq!(merged.strengths.as_deref(), Some("Mentoring"));
        assert_eq!(merged.rating, Some(5));
        assert_eq!(merged.employee_id, 10);
        assert_eq!(merged.reviewed_by, Some(2));
    }

    #[test]
    fn review_needs_a_period_and_a_sane_rating() {
        assert!(validate("2026-Q3", Some(4)).is_ok());
        assert!(validate("2026-Q3", None).is_ok());
        assert_eq!(validate("  ", Some(4)), Err("review_period is required"));
        assert_eq!(
            validate("2026-Q3", Some(9)),
            Err("rating must be between 1 and 5")
        );
    }
}
