use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    config::Config,
    db::payroll::{MySqlPayrollStore, PayrollFilter},
    error::{AppError, AppResult},
    model::{
        payroll::{GeneratePayrollRequest, PayrollPeriod, PayrollReport},
        role::{PAYROLL_RUNNERS, REPORT_MANAGERS},
    },
    services::payroll_batch,
};

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub employee_id: Option<u64>,
    #[schema(example = 3)]
    pub month: Option<u32>,
    #[schema(example = 2025)]
    pub year: Option<i32>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Generates payroll for every active employee in the period. Employees
/// that already have a record are skipped, so the call can be repeated.
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayrollRequest,
    responses(
        (status = 200, description = "Run summary", body = PayrollRunSummary),
        (status = 400, description = "Missing or invalid month/year", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<GeneratePayrollRequest>,
) -> AppResult<HttpResponse> {
    auth.require_any(PAYROLL_RUNNERS)?;

    let period = PayrollPeriod::try_from(&*body)?;
    info!(
        user_id = auth.user_id,
        month = period.month,
        year = period.year,
        "Payroll generation requested"
    );

    let store = MySqlPayrollStore::new(pool.get_ref().clone());
    let summary = payroll_batch::generate(&store, period, config.payroll_proration).await?;

    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/payroll/report/{month}/{year}",
    params(
        ("month" = u32, Path, description = "Month 1-12"),
        ("year" = i32, Path, description = "Four digit year")
    ),
    responses(
        (status = 200, description = "Per-employee breakdown and total", body = PayrollReport),
        (status = 400, description = "Invalid month/year", body = crate::error::ErrorResponse),
        (status = 404, description = "No payroll generated for the period", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payroll_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<(u32, i32)>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let (month, year) = path.into_inner();
    let period = PayrollPeriod::new(month, year)?;

    let store = MySqlPayrollStore::new(pool.get_ref().clone());
    let employees = store.report(period).await?;
    if employees.is_empty() {
        return Err(AppError::not_found(format!(
            "No payroll records for {}/{}",
            month, year
        )));
    }

    let total_net_salary: f64 = employees.iter().map(|e| e.net_salary).sum();
    Ok(HttpResponse::Ok().json(PayrollReport {
        month,
        year,
        employees,
        total_net_salary,
    }))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll records", body = PayrollPage),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let window = PageWindow::new(query.page, query.per_page);
    let filter = PayrollFilter {
        employee_id: query.employee_id,
        month: query.month,
        year: query.year,
    };

    let store = MySqlPayrollStore::new(pool.get_ref().clone());
    let (records, total) = store.list(&filter, window.per_page, window.offset()).await?;

    Ok(HttpResponse::Ok().json(window.wrap(records, total)))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Payroll record id")),
    responses(
        (status = 200, description = "Payroll record", body = PayrollRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let id = path.into_inner();
    let store = MySqlPayrollStore::new(pool.get_ref().clone());

    match store.get(id).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(AppError::not_found("Payroll record not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{bearer, call},
        model::role::Role,
    };
    use actix_web::{http::StatusCode, test::TestRequest};
    use serde_json::json;

    #[actix_web::test]
    async fn hr_cannot_generate_payroll() {
        let resp = call(
            TestRequest::post()
                .uri("/api/payroll/generate")
                .insert_header(bearer(Role::Hr, None))
                .set_json(json!({"month": 3, "year": 2025})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn generate_requires_month_and_year() {
        let resp = call(
            TestRequest::post()
                .uri("/api/payroll/generate")
                .insert_header(bearer(Role::Admin, None))
                .set_json(json!({"month": 3})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = call(
            TestRequest::post()
                .uri("/api/payroll/generate")
                .insert_header(bearer(Role::SuperAdmin, None))
                .set_json(json!({"month": 13, "year": 2025})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn report_rejects_invalid_month() {
        let resp = call(
            TestRequest::get()
                .uri("/api/payroll/report/0/2025")
                .insert_header(bearer(Role::Hr, None)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_read_payroll() {
        let resp = call(
            TestRequest::get()
                .uri("/api/payroll")
                .insert_header(bearer(Role::Employee, Some(4))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
