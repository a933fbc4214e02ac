use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// How a monthly salary is divided into a day rate.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString, Serialize, ToSchema)]
pub enum ProrationPolicy {
    /// Every month counts as 30 days.
    #[strum(serialize = "fixed30")]
    Fixed30,
    /// Actual number of days in the payroll month.
    #[strum(serialize = "calendar")]
    Calendar,
}

impl ProrationPolicy {
    pub fn divisor(self, period: PayrollPeriod) -> u32 {
        match self {
            ProrationPolicy::Fixed30 => 30,
            ProrationPolicy::Calendar => period.days_in_month(),
        }
    }
}

/// `round(monthly_salary / divisor * present_days)`
pub fn compute_net_salary(monthly_salary: f64, present_days: u32, divisor: u32) -> f64 {
    if divisor == 0 {
        return 0.0;
    }
    (monthly_salary / f64::from(divisor) * f64::from(present_days)).round()
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, ToSchema)]
pub struct PayrollPeriod {
    #[schema(example = 3)]
    pub month: u32,
    #[schema(example = 2025)]
    pub year: i32,
}

impl PayrollPeriod {
    pub fn new(month: u32, year: i32) -> AppResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(AppError::validation("month must be between 1 and 12"));
        }
        if !(1900..=9999).contains(&year) {
            return Err(AppError::validation("year must be between 1900 and 9999"));
        }
        Ok(Self { month, year })
    }

    pub fn first_day(self) -> NaiveDate {
        // month and year are validated in `new`
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn days_in_month(self) -> u32 {
        let first = self.first_day();
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        next.map_or(31, |next| (next - first).num_days() as u32)
    }
}

/// Body of `POST /payroll/generate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GeneratePayrollRequest {
    #[schema(example = 3)]
    pub month: Option<u32>,
    #[schema(example = 2025)]
    pub year: Option<i32>,
}

impl TryFrom<&GeneratePayrollRequest> for PayrollPeriod {
    type Error = AppError;

    fn try_from(req: &GeneratePayrollRequest) -> Result<Self, Self::Error> {
        match (req.month, req.year) {
            (Some(month), Some(year)) => PayrollPeriod::new(month, year),
            _ => Err(AppError::validation("Month and year are required")),
        }
    }
}

/// Employee fields the batch generator needs.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PayrollEmployee {
    pub id: u64,
    pub monthly_salary: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayrollRecord {
    pub employee_id: u64,
    pub period: PayrollPeriod,
    pub total_present: u32,
    pub monthly_salary: f64,
    pub net_salary: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollRecord {
    pub id: u64,
    pub employee_id: u64,
    pub month: u32,
    pub year: i32,
    pub total_present: u32,
    pub monthly_salary: f64,
    pub net_salary: f64,
    #[schema(value_type = String, format = "date-time")]
    pub generated_on: DateTime<Utc>,
}

/// Counts returned by one payroll run.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PayrollRunSummary {
    pub month: u32,
    pub year: i32,
    pub successful_records: u32,
    pub skipped_duplicates: u32,
    pub errors: u32,
    pub failed_employee_ids: Vec<u64>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollReportRow {
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    pub monthly_salary: f64,
    pub total_present: u32,
    pub net_salary: f64,
    #[schema(value_type = String, format = "date-time")]
    pub generated_on: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayrollReport {
    pub month: u32,
    pub year: i32,
    pub employees: Vec<PayrollReportRow>,
    pub total_net_salary: f64,
}
