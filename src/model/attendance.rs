use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:30:00")]
    pub check_out: Option<NaiveTime>,
    pub total_hours: Option<f64>,
    #[schema(example = "Present")]
    pub status: String,
}

/// Hours between check-in and check-out, rounded to two decimals.
/// Check-out must be strictly later than check-in on the same day.
pub fn worked_hours(check_in: NaiveTime, check_out: NaiveTime) -> AppResult<f64> {
    if check_out <= check_in {
        return Err(AppError::validation("check_out must be after check_in"));
    }
    let minutes = (check_out - check_in).num_minutes() as f64;
    Ok((minutes / 60.0 * 100.0).round() / 100.0)
}

/// HR entry for an arbitrary employee and day.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendance {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2025-03-03")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:00:00")]
    pub check_out: Option<NaiveTime>,
}

impl MarkAttendance {
    pub fn total_hours(&self) -> AppResult<Option<f64>> {
        match (self.check_in, self.check_out) {
            (Some(i), Some(o)) => worked_hours(i, o).map(Some),
            (None, Some(_)) => Err(AppError::validation("check_out given without check_in")),
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Ignored for employees, who only see their own rows
    pub employee_id: Option<u64>,
    #[schema(example = 3)]
    pub month: Option<u32>,
    #[schema(example = 2025)]
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
