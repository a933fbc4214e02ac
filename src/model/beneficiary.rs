use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct Beneficiary {
    pub id: u64,
    #[schema(example = "Rokeya Begum")]
    pub full_name: String,
    pub gender: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub location: Option<String>,
    #[schema(example = "WASH-2025")]
    pub project: String,
    #[schema(value_type = String, format = "date")]
    pub enrolled_on: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
