use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Expense {
    pub id: u64,
    #[schema(example = "WASH-2025")]
    pub project: String,
    #[schema(example = "Travel")]
    pub category: String,
    #[schema(example = 120.5)]
    pub amount: f64,
    #[schema(value_type = String, format = "date")]
    pub expense_date: NaiveDate,
    pub description: Option<String>,
    pub recorded_by: u64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
