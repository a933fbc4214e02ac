use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::{
    ActivityPage, AttendancePage, BeneficiaryPage, EmployeePage, ExpensePage, LeavePage,
    PayrollPage, ReportPage,
    beneficiary::CreateBeneficiary,
    employee::{CreateEmployee, LinkAccount, UpdateEmployee},
    expense::CreateExpense,
    leave_request::{CreateLeave, LeaveStatus, LeaveType},
    reports::{ReportStatusResponse, ReportSubmission},
};
use crate::error::ErrorResponse;
use crate::model::{
    activity_log::ActivityLog,
    attendance::{Attendance, AttendanceStatus, MarkAttendance},
    beneficiary::Beneficiary,
    employee::{Employee, EmployeeStatus},
    expense::Expense,
    leave_request::LeaveRequest,
    payroll::{
        GeneratePayrollRequest, PayrollRecord, PayrollReport, PayrollReportRow, PayrollRunSummary,
    },
    report::{ReportAudit, ReportPeriodParams, ReportRecord, ReportStatus},
};
use crate::models::{LoginReqDto, TokenPair, UserReq};

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
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

#[derive(OpenApi)]
#[openapi(
    info(
        title = "NGO HR/MIS API",
        version = "1.0.0",
        description = r#"
## NGO HR & Management Information System

Backend for a non-profit's HR and reporting office.

### Key Features
- **Report lifecycle**
  - Periodic reports move `Draft -> Submitted -> Approved -> Locked`; locked periods are read-only
- **Payroll**
  - Monthly payroll prorated by present days; re-running a month only fills gaps
- **Attendance**
  - Daily check-in/check-out and HR-marked attendance
- **Employees, leave, expenses and beneficiaries**
- **Activity log** of every report transition

### Security
All `/api` endpoints require a **JWT Bearer** access token from `/auth/login`.

### Errors
Failures return `{ "error": CODE, "message": text }` with the matching HTTP status.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::reports::get_report_status,
        crate::api::reports::submit_report,
        crate::api::reports::approve_report,
        crate::api::reports::lock_report,
        crate::api::reports::report_audit,
        crate::api::reports::list_reports,

        crate::api::payroll::generate_payroll,
        crate::api::payroll::payroll_report,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::mark_attendance,
        crate::api::attendance::list_attendance,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::link_account,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::expense::create_expense,
        crate::api::expense::list_expenses,
        crate::api::expense::get_expense,

        crate::api::beneficiary::create_beneficiary,
        crate::api::beneficiary::list_beneficiaries,
        crate::api::beneficiary::get_beneficiary,

        crate::api::activity::list_activity
    ),
    components(
        schemas(
            ErrorResponse,
            UserReq,
            LoginReqDto,
            TokenPair,
            ReportStatus,
            ReportPeriodParams,
            ReportStatusResponse,
            ReportSubmission,
            ReportRecord,
            ReportAudit,
            ReportPage,
            GeneratePayrollRequest,
            PayrollRunSummary,
            PayrollRecord,
            PayrollReport,
            PayrollReportRow,
            PayrollPage,
            Attendance,
            AttendanceStatus,
            MarkAttendance,
            AttendancePage,
            Employee,
            EmployeeStatus,
            CreateEmployee,
            UpdateEmployee,
            LinkAccount,
            EmployeePage,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            LeavePage,
            Expense,
            CreateExpense,
            ExpensePage,
            Beneficiary,
            CreateBeneficiary,
            BeneficiaryPage,
            ActivityLog,
            ActivityPage
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, registration and token rotation"),
        (name = "Reports", description = "Report submission, approval and locking"),
        (name = "Payroll", description = "Monthly payroll generation and reports"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Expenses", description = "Project expense records"),
        (name = "Beneficiaries", description = "Programme beneficiaries"),
        (name = "Activity", description = "Audit trail"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_report_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/reports/submit"));
        assert!(doc.paths.paths.contains_key("/api/payroll/report/{month}/{year}"));
        assert!(doc.paths.paths.contains_key("/api/employee/{employee_id}/account"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
