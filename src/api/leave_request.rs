use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use strum_macros::{AsRefStr, EnumString};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    error::{AppError, AppResult},
    model::{leave_request::LeaveRequest, role::REPORT_MANAGERS},
};

const LEAVE_COLUMNS: &str =
    "id, employee_id, start_date, end_date, leave_type, reason, status, reviewed_by, created_at";

#[derive(Debug, Copy, Clone, Deserialize, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, AsRefStr, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
    #[schema(example = "Fever")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee ID, ignored for employees
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<LeaveStatus>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

impl CreateLeave {
    fn validate(&self) -> AppResult<()> {
        if self.start_date > self.end_date {
            return Err(AppError::validation("start_date cannot be after end_date"));
        }
        if self.reason.as_ref().is_some_and(|r| r.len() > 500) {
            return Err(AppError::validation("reason must be at most 500 characters"));
        }
        Ok(())
    }
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "status": "pending"
         })
        ),
        (status = 400, description = "Invalid dates or leave type", body = crate::error::ErrorResponse),
        (status = 403, description = "No employee profile", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id()?;
    payload.validate()?;

    sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, start_date, end_date, leave_type, reason, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(&payload.reason)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    info!(employee_id, "Leave request submitted");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave request submitted",
        "status": "pending"
    })))
}

async fn review(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    decision: LeaveStatus,
) -> AppResult<()> {
    auth.require_any(REPORT_MANAGERS)?;

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_by = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(leave_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::validation(
            "Leave request not found or already processed",
        ));
    }

    info!(leave_id, reviewer = auth.user_id, status = decision.as_ref(), "Leave reviewed");
    Ok(())
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 400, description = "Leave request not found or already processed", body = crate::error::ErrorResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    review(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved"
    })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 400, description = "Leave request not found or already processed", body = crate::error::ErrorResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    review(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected"
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 404, description = "Leave request not found", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let leave_id = path.into_inner();

    let leave = sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {} FROM leave_requests WHERE id = ?",
        LEAVE_COLUMNS
    ))
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await?;

    match leave {
        // other employees' requests are reported as missing
        Some(data)
            if auth.has_any(REPORT_MANAGERS) || auth.employee_id == Some(data.employee_id) =>
        {
            Ok(HttpResponse::Ok().json(data))
        }
        _ => Err(AppError::not_found("Leave request not found")),
    }
}

fn push_filter(
    qb: &mut QueryBuilder<'_, MySql>,
    employee_id: Option<u64>,
    status: Option<LeaveStatus>,
) {
    if let Some(employee_id) = employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeavePage),
        (status = 403, description = "No employee profile", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> AppResult<HttpResponse> {
    let employee_id = if auth.has_any(REPORT_MANAGERS) {
        query.employee_id
    } else {
        Some(auth.employee_id()?)
    };
    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM leave_requests WHERE 1=1");
    push_filter(&mut count, employee_id, query.status);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM leave_requests WHERE 1=1",
        LEAVE_COLUMNS
    ));
    push_filter(&mut data, employee_id, query.status);
    data.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let leaves: Vec<LeaveRequest> = data.build_query_as().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(window.wrap(leaves, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{bearer, call},
        model::role::Role,
    };
    use actix_web::{http::StatusCode, test::TestRequest};

    #[test]
    fn leave_strings_are_lowercase() {
        assert_eq!(LeaveType::Sick.as_ref(), "sick");
        assert_eq!(LeaveStatus::Pending.as_ref(), "pending");
        assert_eq!("approved".parse::<LeaveStatus>().ok(), Some(LeaveStatus::Approved));
    }

    #[actix_web::test]
    async fn start_after_end_is_rejected() {
        let resp = call(
            TestRequest::post()
                .uri("/api/leave")
                .insert_header(bearer(Role::Employee, Some(1)))
                .set_json(json!({
                    "start_date": "2026-01-05",
                    "end_date": "2026-01-01",
                    "leave_type": "sick"
                })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_leave_type_is_rejected() {
        let resp = call(
            TestRequest::post()
                .uri("/api/leave")
                .insert_header(bearer(Role::Employee, Some(1)))
                .set_json(json!({
                    "start_date": "2026-01-01",
                    "end_date": "2026-01-02",
                    "leave_type": "holiday"
                })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_approve() {
        let resp = call(
            TestRequest::put()
                .uri("/api/leave/3/approve")
                .insert_header(bearer(Role::Employee, Some(1))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
