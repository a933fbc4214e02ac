use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    config::Config,
    db::reports::{MySqlReportStore, ReportFilter},
    error::{AppError, AppResult},
    model::{
        file_upload::IncomingFile,
        report::{ReportPeriod, ReportPeriodParams, ReportStatus},
        role::{REPORT_MANAGERS, Role},
    },
    services::report_lifecycle,
    utils::uploads::UploadStore,
};

#[derive(Serialize, ToSchema)]
pub struct ReportStatusResponse {
    #[schema(example = "Submitted")]
    pub status: ReportStatus,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportListQuery {
    #[schema(example = "monthly")]
    pub report_type: Option<String>,
    #[schema(example = 2025)]
    pub year: Option<i32>,
    pub status: Option<ReportStatus>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Multipart body of `POST /reports/submit`, documented for Swagger only.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ReportSubmission {
    #[schema(example = "monthly")]
    report_type: String,
    #[schema(example = "March")]
    month: String,
    #[schema(example = 2025)]
    year: i32,
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Default)]
struct SubmissionForm {
    report_type: Option<String>,
    month: Option<String>,
    year: Option<String>,
    file: Option<IncomingFile>,
}

async fn read_field(field: &mut actix_multipart::Field, limit: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::validation(format!("Read error: {}", e)))?;
        if bytes.len() + chunk.len() > limit {
            return Err(AppError::validation(format!(
                "Upload exceeds the limit of {} bytes",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text(field: &mut actix_multipart::Field, name: &str) -> AppResult<String> {
    let bytes = read_field(field, 1024).await?;
    String::from_utf8(bytes)
        .map_err(|_| AppError::validation(format!("{} must be UTF-8 text", name)))
}

async fn read_submission(
    mut payload: Multipart,
    max_upload_bytes: usize,
) -> AppResult<(ReportPeriod, IncomingFile)> {
    let mut form = SubmissionForm::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::validation(format!("Multipart error: {}", e)))?;

        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| AppError::validation("Missing content disposition"))?;
        let name = content_disposition.get_name().unwrap_or_default().to_string();
        let filename = content_disposition.get_filename().map(str::to_string);

        match name.as_str() {
            "report_type" => form.report_type = Some(read_text(&mut field, &name).await?),
            "month" => form.month = Some(read_text(&mut field, &name).await?),
            "year" => form.year = Some(read_text(&mut field, &name).await?),
            "file" => {
                let mime_type = field.content_type().map(|m| m.to_string());
                let bytes = read_field(&mut field, max_upload_bytes).await?;
                form.file = Some(IncomingFile {
                    original_name: filename.unwrap_or_else(|| "report".to_string()),
                    mime_type,
                    bytes,
                });
            }
            // unknown parts are drained and ignored
            _ => {
                read_field(&mut field, max_upload_bytes).await?;
            }
        }
    }

    let year = form
        .year
        .as_deref()
        .map(|y| {
            y.trim()
                .parse::<i32>()
                .map_err(|_| AppError::validation("year must be a number"))
        })
        .transpose()?;

    let params = ReportPeriodParams {
        report_type: form.report_type,
        month: form.month,
        year,
    };
    let period = ReportPeriod::try_from(&params)?;
    let file = form
        .file
        .ok_or_else(|| AppError::validation("file is required"))?;

    Ok((period, file))
}

/// Current status of a report period, `Draft` if it was never submitted.
#[utoipa::path(
    get,
    path = "/api/reports/status",
    params(ReportPeriodParams),
    responses(
        (status = 200, description = "Current status", body = ReportStatusResponse),
        (status = 400, description = "Missing or invalid period", body = crate::error::ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn get_report_status(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportPeriodParams>,
) -> AppResult<HttpResponse> {
    let period = ReportPeriod::try_from(&*query)?;
    let store = MySqlReportStore::new(pool.get_ref().clone());

    let status = report_lifecycle::get_status(&store, &period).await?;
    Ok(HttpResponse::Ok().json(ReportStatusResponse { status }))
}

/// Uploads the report file and marks the period `Submitted`.
#[utoipa::path(
    post,
    path = "/api/reports/submit",
    request_body(content = ReportSubmission, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Report submitted", body = Object, example = json!({
            "message": "Report submitted",
            "status": "Submitted",
            "file_id": 12
        })),
        (status = 400, description = "Missing fields or empty file", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed or report is locked", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn submit_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    uploads: web::Data<UploadStore>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let (period, file) = read_submission(payload, config.max_upload_bytes).await?;
    let store = MySqlReportStore::new(pool.get_ref().clone());

    let file_id =
        report_lifecycle::submit(&store, uploads.get_ref(), &period, auth.user_id, file).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Report submitted",
        "status": ReportStatus::Submitted,
        "file_id": file_id
    })))
}

#[utoipa::path(
    post,
    path = "/api/reports/approve",
    request_body = ReportPeriodParams,
    responses(
        (status = 200, description = "Report approved", body = Object, example = json!({
            "message": "Report approved",
            "status": "Approved"
        })),
        (status = 403, description = "Not a super admin, or report is locked", body = crate::error::ErrorResponse),
        (status = 404, description = "Period was never submitted", body = crate::error::ErrorResponse),
        (status = 409, description = "Report is not in Submitted state", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn approve_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ReportPeriodParams>,
) -> AppResult<HttpResponse> {
    auth.require_role(Role::SuperAdmin)?;

    let period = ReportPeriod::try_from(&*body)?;
    let store = MySqlReportStore::new(pool.get_ref().clone());
    report_lifecycle::approve(&store, &period, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Report approved",
        "status": ReportStatus::Approved
    })))
}

/// Locks an approved period. There is no unlock.
#[utoipa::path(
    post,
    path = "/api/reports/status",
    request_body = ReportPeriodParams,
    responses(
        (status = 200, description = "Report locked", body = Object, example = json!({
            "message": "Report locked",
            "status": "Locked"
        })),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse),
        (status = 404, description = "Period was never submitted", body = crate::error::ErrorResponse),
        (status = 409, description = "Report is not approved or already locked", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn lock_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<ReportPeriodParams>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let period = ReportPeriod::try_from(&*body)?;
    let store = MySqlReportStore::new(pool.get_ref().clone());
    report_lifecycle::lock(&store, &period, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Report locked",
        "status": ReportStatus::Locked
    })))
}

#[utoipa::path(
    get,
    path = "/api/reports/audit",
    params(ReportPeriodParams),
    responses(
        (status = 200, description = "Who submitted, approved and locked the period", body = ReportAudit),
        (status = 400, description = "Missing or invalid period", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn report_audit(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportPeriodParams>,
) -> AppResult<HttpResponse> {
    let period = ReportPeriod::try_from(&*query)?;
    let store = MySqlReportStore::new(pool.get_ref().clone());

    let audit = report_lifecycle::audit(&store, &period).await?;
    Ok(HttpResponse::Ok().json(audit))
}

#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportListQuery),
    responses(
        (status = 200, description = "Paginated report periods", body = ReportPage),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn list_reports(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportListQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let window = PageWindow::new(query.page, query.per_page);
    let query = query.into_inner();
    let filter = ReportFilter {
        report_type: query.report_type,
        year: query.year,
        status: query.status,
    };

    let store = MySqlReportStore::new(pool.get_ref().clone());
    let (rows, total) = store.list(&filter, window.per_page, window.offset()).await?;

    Ok(HttpResponse::Ok().json(window.wrap(rows, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, call};
    use actix_web::{http::StatusCode, test::TestRequest};

    #[actix_web::test]
    async fn status_requires_a_token() {
        let resp = call(
            TestRequest::get().uri("/api/reports/status?report_type=monthly&month=March&year=2025"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn status_without_year_is_a_validation_error() {
        let resp = call(
            TestRequest::get()
                .uri("/api/reports/status?report_type=monthly&month=March")
                .insert_header(bearer(Role::Employee, Some(1))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn only_super_admin_may_approve() {
        let body = json!({"report_type": "monthly", "month": "March", "year": 2025});
        for role in [Role::Admin, Role::Hr, Role::Employee] {
            let resp = call(
                TestRequest::post()
                    .uri("/api/reports/approve")
                    .insert_header(bearer(role, None))
                    .set_json(&body),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{:?}", role);
        }
    }

    #[actix_web::test]
    async fn approve_without_period_is_a_validation_error() {
        let resp = call(
            TestRequest::post()
                .uri("/api/reports/approve")
                .insert_header(bearer(Role::SuperAdmin, None))
                .set_json(json!({"report_type": "monthly"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_submit_or_lock() {
        let resp = call(
            TestRequest::post()
                .uri("/api/reports/submit")
                .insert_header(bearer(Role::Employee, Some(3)))
                .insert_header(("content-type", "multipart/form-data; boundary=x"))
                .set_payload("--x--\r\n"),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = call(
            TestRequest::post()
                .uri("/api/reports/status")
                .insert_header(bearer(Role::ApiUser, None))
                .set_json(json!({"report_type": "monthly", "month": "March", "year": 2025})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn submission_without_file_is_rejected() {
        let body = "--x\r\n\
            Content-Disposition: form-data; name=\"report_type\"\r\n\r\n\
            monthly\r\n\
            --x\r\n\
            Content-Disposition: form-data; name=\"month\"\r\n\r\n\
            March\r\n\
            --x\r\n\
            Content-Disposition: form-data; name=\"year\"\r\n\r\n\
            2025\r\n\
            --x--\r\n";

        let resp = call(
            TestRequest::post()
                .uri("/api/reports/submit")
                .insert_header(bearer(Role::Hr, None))
                .insert_header(("content-type", "multipart/form-data; boundary=x"))
                .set_payload(body),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
