use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::mysql_string_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
pub enum LeaveType {
    #[serde(rename = "sickLeave")]
    #[strum(serialize = "sickLeave")]
    SickLeave,
    #[serde(rename = "casualLeave")]
    #[strum(serialize = "casualLeave")]
    CasualLeave,
    /// Leave without pay
    #[serde(rename = "LWP")]
    #[strum(serialize = "LWP")]
    Lwp,
}

impl LeaveType {
    /// Paid leave draws from the employee's balance; LWP does not.
    pub fn is_paid(self) -> bool {
        !matches!(self, LeaveType::Lwp)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

mysql_string_enum!(LeaveType);
mysql_string_enum!(LeaveStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "Fever", nullable = true)]
    pub reason: Option<String>,
    pub status: LeaveStatus,
    #[schema(example = 2, nullable = true)]
    pub approved_by: Option<u64>,
    #[schema(example = "2026-01-01T00:00:00Z", value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveRequest {
    /// Inclusive day span of the request.
    pub fn days(&self) -> u32 {
        leave_span(self.start_date, self.end_date)
    }
}

/// Inclusive number of days between two dates, zero when `end < start`.
pub fn leave_span(start: NaiveDate, end: NaiveDate) -> u32 {
    let days = (end - start).num_days() + 1;
    u32::try_from(days).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leave_type_uses_original_wire_names() {
        assert_eq!(LeaveType::SickLeave.as_ref(), "sickLeave");
        assert_eq!("LWP".parse::<LeaveType>().unwrap(), LeaveType::Lwp);
        assert_eq!(
            serde_json::to_string(&LeaveType::CasualLeave).unwrap(),
            "\"casualLeave\""
        );
        assert!(!LeaveType::Lwp.is_paid());
        assert!("annual".parse::<LeaveType>().is_err());
    }

    #[test]
    fn span_is_inclusive() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        assert_eq!(leave_span(d(1), d(1)), 1);
        assert_eq!(leave_span(d(1), d(5)), 5);
        assert_eq!(leave_span(d(5), d(1)), 0);
    }
}
