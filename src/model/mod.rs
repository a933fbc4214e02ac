pub mod activity_log;
pub mod attendance;
pub mod beneficiary;
pub mod employee;
pub mod expense;
pub mod file_upload;
pub mod leave_request;
pub mod payroll;
pub mod report;
pub mod role;
pub mod user;
