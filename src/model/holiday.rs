use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "2026-12-16", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Victory Day")]
    pub name: String,
}
