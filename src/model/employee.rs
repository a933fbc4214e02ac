use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "first_name": "Amina",
        "last_name": "Rahman",
        "email": "amina.rahman@ngo.org",
        "phone": "+8801712345678",
        "department": "Programs",
        "designation": "Field Officer",
        "monthly_salary": 3000.0,
        "join_date": "2024-01-01",
        "status": "Active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    pub first_name: String,

    pub last_name: String,

    pub email: String,

    #[schema(nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Programs", nullable = true)]
    pub department: Option<String>,

    #[schema(example = "Field Officer", nullable = true)]
    pub designation: Option<String>,

    #[schema(example = 3000.0)]
    pub monthly_salary: f64,

    #[schema(
        example = "2024-01-01",
        value_type = String,
        format = "date"
    )]
    pub join_date: NaiveDate,

    #[schema(example = "Active")]
    pub status: String,
}
