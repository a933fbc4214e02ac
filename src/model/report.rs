use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Lifecycle of a report period. `Draft` is never stored: it is the status of
/// a period without a `report_status` row.
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
    ToSchema,
)]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Locked,
}

impl ReportStatus {
    /// The status a row must be in for a transition into `self`.
    pub fn required_prior(self) -> Option<ReportStatus> {
        match self {
            ReportStatus::Approved => Some(ReportStatus::Submitted),
            ReportStatus::Locked => Some(ReportStatus::Approved),
            ReportStatus::Draft | ReportStatus::Submitted => None,
        }
    }
}

/// One reporting cycle, e.g. `monthly March/2025`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Display, Serialize, ToSchema)]
#[display(fmt = "{} {}/{}", report_type, month, year)]
pub struct ReportPeriod {
    #[schema(example = "monthly")]
    pub report_type: String,
    #[schema(example = "March")]
    pub month: String,
    #[schema(example = 2025)]
    pub year: i32,
}

impl ReportPeriod {
    pub fn new(report_type: &str, month: &str, year: i32) -> AppResult<Self> {
        let report_type = report_type.trim();
        let month = month.trim();

        if report_type.is_empty() || month.is_empty() {
            return Err(AppError::validation("report_type and month must not be empty"));
        }
        if report_type.len() > 64 || month.len() > 20 {
            return Err(AppError::validation("report_type or month is too long"));
        }
        if !(1900..=9999).contains(&year) {
            return Err(AppError::validation("year must be between 1900 and 9999"));
        }

        Ok(Self {
            report_type: report_type.to_string(),
            month: month.to_string(),
            year,
        })
    }

    /// Reference stored in `activity_logs.entity_ref`.
    pub fn entity_ref(&self) -> String {
        format!("{}:{}:{}", self.report_type, self.month, self.year)
    }
}

/// Query/body shape shared by the report endpoints. All fields are optional
/// so that a missing field yields a JSON validation error.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportPeriodParams {
    #[schema(example = "monthly")]
    pub report_type: Option<String>,
    #[schema(example = "March")]
    pub month: Option<String>,
    #[schema(example = 2025)]
    pub year: Option<i32>,
}

impl TryFrom<&ReportPeriodParams> for ReportPeriod {
    type Error = AppError;

    fn try_from(params: &ReportPeriodParams) -> Result<Self, Self::Error> {
        match (&params.report_type, &params.month, params.year) {
            (Some(report_type), Some(month), Some(year)) => {
                ReportPeriod::new(report_type, month, year)
            }
            _ => Err(AppError::validation(
                "report_type, month and year are required",
            )),
        }
    }
}

/// Stored `report_status` row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportRecord {
    pub id: u64,
    pub report_type: String,
    pub month: String,
    pub year: i32,
    pub status: ReportStatus,
    pub submitted_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub locked_at: Option<DateTime<Utc>>,
    pub file_id: Option<u64>,
}

/// Raw row as read by sqlx; `status` is converted with `TryFrom`.
#[derive(Debug, sqlx::FromRow)]
pub struct ReportRow {
    pub id: u64,
    pub report_type: String,
    pub month: String,
    pub year: i32,
    pub status: String,
    pub submitted_by: Option<u64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<u64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_by: Option<u64>,
    pub locked_at: Option<DateTime<Utc>>,
    pub file_id: Option<u64>,
}

impl TryFrom<ReportRow> for ReportRecord {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ReportStatus>().map_err(|_| {
            AppError::Internal(format!("unknown report status '{}' in row {}", row.status, row.id))
        })?;

        Ok(ReportRecord {
            id: row.id,
            report_type: row.report_type,
            month: row.month,
            year: row.year,
            status,
            submitted_by: row.submitted_by,
            submitted_at: row.submitted_at,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            locked_by: row.locked_by,
            locked_at: row.locked_at,
            file_id: row.file_id,
        })
    }
}

/// Who moved the period through each stage, all `None` for a draft.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportAudit {
    pub status: ReportStatus,
    pub submitted_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub locked_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub locked_at: Option<DateTime<Utc>>,
    pub file_id: Option<u64>,
}

impl From<Option<ReportRecord>> for ReportAudit {
    fn from(record: Option<ReportRecord>) -> Self {
        match record {
            Some(r) => ReportAudit {
                status: r.status,
                submitted_by: r.submitted_by,
                submitted_at: r.submitted_at,
                approved_by: r.approved_by,
                approved_at: r.approved_at,
                locked_by: r.locked_by,
                locked_at: r.locked_at,
                file_id: r.file_id,
            },
            None => ReportAudit {
                status: ReportStatus::Draft,
                submitted_by: None,
                submitted_at: None,
                approved_by: None,
                approved_at: None,
                locked_by: None,
                locked_at: None,
                file_id: None,
            },
        }
    }
}
