use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lowest and highest accepted review rating.
pub const RATING_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PerformanceReview {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-Q3")]
    pub review_period: String,
    #[schema(example = "Shipped the payroll export", nullable = true)]
    pub goals_achieved: Option<String>,
    #[schema(nullable = true)]
    pub strengths: Option<String>,
    #[schema(nullable = true)]
    pub weaknesses: Option<String>,
    #[schema(nullable = true)]
    pub feedback: Option<String>,
    #[schema(example = 4, minimum = 1, maximum = 5, nullable = true)]
    pub rating: Option<u8>,
    /// Employee profile of the reviewer
    #[schema(example = 2, nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Column list matching [`PerformanceReview`], for `query_as`.
pub const PERFORMANCE_COLUMNS: &str = "id, employee_id, review_period, goals_achieved, \
     strengths, weaknesses, feedback, rating, reviewed_by, created_at, updated_at";

pub fn valid_rating(rating: Option<u8>) -> bool {
    rating.is_none_or(|r| RATING_RANGE.contains(&r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratings_are_one_to_five_or_absent() {
        assert!(valid_rating(None));
        assert!(valid_rating(Some(1)));
        assert!(valid_rating(Some(5)));
        assert!(!valid_rating(Some(0)));
        assert!(!valid_rating(Some(6)));
    }
}
