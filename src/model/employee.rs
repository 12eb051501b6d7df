use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::mysql_string_enum;
use crate::reconciliation::ledger::LeaveBalance;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    OnLeave,
    WeeklyOff,
}

mysql_string_enum!(EmployeeStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department_id": 10,
        "designation": "Engineer",
        "hire_date": "2024-01-01",
        "salary": 50000.0,
        "sick_leave": 4,
        "casual_leave": 8,
        "total_leave_taken": 0,
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe", nullable = true)]
    pub last_name: Option<String>,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 10, nullable = true)]
    pub department_id: Option<u64>,

    #[schema(example = "Engineer", nullable = true)]
    pub designation: Option<String>,

    #[schema(example = "2024-01-01", value_type = String, format = "date", nullable = true)]
    pub hire_date: Option<NaiveDate>,

    #[schema(example = 50000.0, nullable = true)]
    pub salary: Option<f64>,

    /// Remaining sick leave days
    #[schema(example = 4)]
    pub sick_leave: u32,

    /// Remaining casual leave days
    #[schema(example = 8)]
    pub casual_leave: u32,

    #[schema(example = 0)]
    pub total_leave_taken: u32,

    pub status: EmployeeStatus,
}

impl Employee {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }

    pub fn balance(&self) -> LeaveBalance {
        LeaveBalance {
            sick_leave: self.sick_leave,
            casual_leave: self.casual_leave,
        }
    }
}

/// Column list matching [`Employee`], for `query_as`.
pub const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
     department_id, designation, hire_date, salary, sick_leave, casual_leave, \
     total_leave_taken, status";
