use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{beneficiary::Beneficiary, role::REPORT_MANAGERS},
};

const BENEFICIARY_COLUMNS: &str =
    "id, full_name, gender, date_of_birth, phone, location, project, enrolled_on, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateBeneficiary {
    #[schema(example = "Rokeya Begum")]
    pub full_name: String,
    #[schema(example = "female")]
    pub gender: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    #[schema(example = "Kurigram")]
    pub location: Option<String>,
    #[schema(example = "WASH-2025")]
    pub project: String,
    #[schema(example = "2025-02-01", format = "date", value_type = String)]
    pub enrolled_on: NaiveDate,
}

impl CreateBeneficiary {
    fn validate(&self) -> AppResult<()> {
        if self.full_name.trim().is_empty() || self.project.trim().is_empty() {
            return Err(AppError::validation("full_name and project are required"));
        }
        if self.date_of_birth.is_some_and(|dob| dob > self.enrolled_on) {
            return Err(AppError::validation("date_of_birth cannot be after enrolled_on"));
        }
        Ok(())
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BeneficiaryQuery {
    pub project: Option<String>,
    /// Search by name or phone
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a BeneficiaryQuery) {
    if let Some(project) = &query.project {
        qb.push(" AND project = ").push_bind(project);
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", search);
        qb.push(" AND (full_name LIKE ")
            .push_bind(like.clone())
            .push(" OR phone LIKE ")
            .push_bind(like)
            .push(")");
    }
}

#[utoipa::path(
    post,
    path = "/api/beneficiaries",
    request_body = CreateBeneficiary,
    responses(
        (status = 201, description = "Beneficiary enrolled", body = Object, example = json!({
            "message": "Beneficiary enrolled",
            "id": 1
        })),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Beneficiaries"
)]
pub async fn create_beneficiary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateBeneficiary>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;
    payload.validate()?;

    let id = sqlx::query(
        r#"
        INSERT INTO beneficiaries
            (full_name, gender, date_of_birth, phone, location, project, enrolled_on)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.full_name.trim())
    .bind(&payload.gender)
    .bind(payload.date_of_birth)
    .bind(&payload.phone)
    .bind(&payload.location)
    .bind(payload.project.trim())
    .bind(payload.enrolled_on)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(beneficiary_id = id, by = auth.user_id, "Beneficiary enrolled");
    Ok(HttpResponse::Created().json(json!({
        "message": "Beneficiary enrolled",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/beneficiaries",
    params(BeneficiaryQuery),
    responses(
        (status = 200, description = "Paginated beneficiaries", body = BeneficiaryPage)
    ),
    security(("bearer_auth" = [])),
    tag = "Beneficiaries"
)]
pub async fn list_beneficiaries(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BeneficiaryQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM beneficiaries WHERE 1=1");
    push_filter(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM beneficiaries WHERE 1=1",
        BENEFICIARY_COLUMNS
    ));
    push_filter(&mut data, &query);
    data.push(" ORDER BY id DESC LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let rows: Vec<Beneficiary> = data.build_query_as().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(window.wrap(rows, total)))
}

#[utoipa::path(
    get,
    path = "/api/beneficiaries/{id}",
    params(("id" = u64, Path, description = "Beneficiary id")),
    responses(
        (status = 200, description = "Beneficiary", body = Beneficiary),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Beneficiaries"
)]
pub async fn get_beneficiary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let row = sqlx::query_as::<_, Beneficiary>(&format!(
        "SELECT {} FROM beneficiaries WHERE id = ?",
        BENEFICIARY_COLUMNS
    ))
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?;

    row.map(|b| HttpResponse::Ok().json(b))
        .ok_or_else(|| AppError::not_found("Beneficiary not found"))
}
