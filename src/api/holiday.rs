use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{bad_request, internal_error, is_constraint_violation, not_found},
    auth::auth::AuthUser,
    model::holiday::Holiday,
};

#[derive(Deserialize, ToSchema)]
pub struct HolidayPayload {
    #[schema(example = "2026-12-16", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Victory Day")]
    pub name: String,
}

#[derive(Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// Calendar year to list, all years when absent
    pub year: Option<i32>,
}

/// First and last day of `year`.
fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses(
        (status = 200, description = "Holidays ordered by date", body = [Holiday]),
        (status = 400, description = "Invalid year")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> actix_web::Result<impl Responder> {
    let holidays = match query.year {
        Some(year) => {
            let Some((first, last)) = year_bounds(year) else {
                return Ok(bad_request(format!("Invalid year {year}")));
            };
            sqlx::query_as::<_, Holiday>(
                "SELECT id, date, name FROM company_holidays WHERE date BETWEEN ? AND ? ORDER BY date",
            )
            .bind(first)
            .bind(last)
            .fetch_all(pool.get_ref())
            .await
        }
        None => {
            sqlx::query_as::<_, Holiday>("SELECT id, date, name FROM company_holidays ORDER BY date")
                .fetch_all(pool.get_ref())
                .await
        }
    }
    .map_err(|e| internal_error(e, "Failed to list holidays"))?;

    Ok(HttpResponse::Ok().json(holidays))
}

#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = HolidayPayload,
    responses(
        (status = 201, body = Holiday),
        (status = 400, description = "Name is required"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HolidayPayload>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(bad_request("Holiday name is required"));
    }

    let result = sqlx::query("INSERT INTO company_holidays (date, name) VALUES (?, ?)")
        .bind(payload.date)
        .bind(name)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            info!(date = %payload.date, name, "Company holiday added");
            Ok(HttpResponse::Created().json(Holiday {
                id: res.last_insert_id(),
                date: payload.date,
                name: name.to_string(),
            }))
        }
        Err(e) if is_constraint_violation(&e) => Ok(HttpResponse::Conflict().json(json!({
            "message": "A holiday already exists on that date"
        }))),
        Err(e) => Err(internal_error(e, "Failed to add holiday")),
    }
}

#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday removed"),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let holiday_id = path.into_inner();

    let result = sqlx::query("DELETE FROM company_holidays WHERE id = ?")
        .bind(holiday_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| internal_error(e, "Failed to remove holiday"))?;

    if result.rows_affected() == 0 {
        return Ok(not_found("Holiday not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Holiday removed"
    })))
}
