use crate::api::attendance::{AttendanceQuery, DayAttendance, UnmarkedEmployee};
use crate::api::dashboard::{Dashboard, DepartmentSummary};
use crate::api::department::DepartmentPayload;
use crate::api::employee::{
    CreateEmployee, EmployeeListResponse, EmployeeQuery, MyProfile, UpdateLeaveBalance,
};
use crate::api::holiday::HolidayPayload;
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::payroll::{CreatePayroll, PaginatedPayrollResponse, PayrollQuery, UpdatePayroll};
use crate::api::performance::{CreateReview, UpdateReview};
use crate::api::reconciliation::{
    MonthlyReport, MonthlyReportEntry, ReconcileRequest, ReconcileResponse, ReportEmployee,
    ReportFailure,
};
use crate::api::users::{UpdateRole, UserSummary};
use crate::auth::handlers::LoginResponse;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::department::Department;
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::holiday::Holiday;
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{Payroll, PayrollStatus};
use crate::model::performance::PerformanceReview;
use crate::models::{LoginReqDto, UserReq};
use crate::reconciliation::engine::{LeaveTypesTaken, ReconciliationResult};
use crate::reconciliation::ledger::LeaveBalance;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Ledger API",
        version = "1.0.0",
        description = r#"
## Attendance & Leave Reconciliation

Monthly reconciliation of employee attendance against approved leave, with
paid leave charged against each employee's sick and casual balances exactly
once per period.

### 🔹 Key Features
- **Reconciliation**
  - Reconcile one employee for any period, or every active employee for a month
  - Re-running a reconciled period replays the stored result
- **Leave Management**
  - Apply for leave, approve/reject requests, monthly caps
- **Attendance Management**
  - Daily check-in and check-out in office time, late tracking, auto check-out
- **Employees, Departments & Payroll**

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Only **Admin** or **HR** can access sensitive operations.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::register,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::reconciliation::reconcile,
        crate::api::reconciliation::monthly_report,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::delete_leave,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::trigger_auto_checkout,
        crate::api::attendance::my_today,
        crate::api::attendance::all_today,
        crate::api::attendance::attendance_on,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::update_leave_balance,
        crate::api::employee::delete_employee,
        crate::api::employee::my_profile,

        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::create_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::my_payrolls,
        crate::api::payroll::delete_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::performance::list_reviews,
        crate::api::performance::my_reviews,
        crate::api::performance::get_review,
        crate::api::performance::create_review,
        crate::api::performance::update_review,
        crate::api::performance::delete_review,

        crate::api::holiday::list_holidays,
        crate::api::holiday::create_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::users::list_users,
        crate::api::users::update_user_role,
        crate::api::users::delete_user,

        crate::api::dashboard::dashboard
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            LoginResponse,
            ReconcileRequest,
            ReconcileResponse,
            ReconciliationResult,
            LeaveTypesTaken,
            LeaveBalance,
            MonthlyReport,
            MonthlyReportEntry,
            ReportEmployee,
            ReportFailure,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            LeaveFilter,
            CreateLeave,
            LeaveListResponse,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceQuery,
            DayAttendance,
            UnmarkedEmployee,
            Employee,
            EmployeeStatus,
            EmployeeQuery,
            CreateEmployee,
            UpdateLeaveBalance,
            EmployeeListResponse,
            MyProfile,
            Department,
            DepartmentPayload,
            Payroll,
            PayrollStatus,
            PaginatedPayrollResponse,
            CreatePayroll,
            UpdatePayroll,
            PayrollQuery,
            PerformanceReview,
            CreateReview,
            UpdateReview,
            Holiday,
            HolidayPayload,
            UserSummary,
            UpdateRole,
            Dashboard,
            DepartmentSummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, registration and token rotation"),
        (name = "Reconciliation", description = "Monthly attendance and leave reconciliation"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Department", description = "Department management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Performance", description = "Performance review APIs"),
        (name = "Holiday", description = "Company holiday calendar"),
        (name = "Users", description = "Login account administration"),
        (name = "Dashboard", description = "Headcount and attendance overview"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_reconciliation_and_bearer_auth() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/reconciliation"));
        assert!(doc.paths.paths.contains_key("/api/reports/monthly"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ReconciliationResult"));
    }

    #[test]
    fn openapi_documents_day_views_and_admin_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/attendance/today/mine",
            "/api/attendance/today/all",
            "/api/attendance/date/{date}",
            "/api/performance/mine",
            "/api/holidays",
            "/api/users/{user_id}",
            "/api/admin/dashboard",
            "/api/myprofile",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
