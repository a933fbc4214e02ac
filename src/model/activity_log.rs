use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ActivityLog {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "report.submit")]
    pub action: String,
    #[schema(example = "report")]
    pub entity_type: String,
    #[schema(example = "monthly:March:2025")]
    pub entity_ref: String,
    pub details: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Entry appended alongside a state change.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub user_id: u64,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_ref: String,
    pub details: Option<String>,
}
