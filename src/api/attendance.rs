use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::info;

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    db::{is_duplicate_key, is_foreign_key_violation},
    error::{AppError, AppResult},
    model::{
        attendance::{Attendance, AttendanceQuery, AttendanceStatus, MarkAttendance, worked_hours},
        role::REPORT_MANAGERS,
    },
};

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 403, description = "No employee profile", body = crate::error::ErrorResponse),
        (status = 409, description = "Already checked in today", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id()?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_logs (employee_id, date, check_in, status)
        VALUES (?, CURDATE(), CURTIME(), ?)
        "#,
    )
    .bind(employee_id)
    .bind(AttendanceStatus::Present.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(employee_id, "Checked in");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Checked in successfully"
            })))
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::conflict("Already checked in today")),
        Err(e) => Err(e.into()),
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully",
            "total_hours": 8.5
        })),
        (status = 400, description = "Already checked out, or check-out not after check-in", body = crate::error::ErrorResponse),
        (status = 404, description = "No check-in today", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> AppResult<HttpResponse> {
    let employee_id = auth.employee_id()?;

    // the database clock decides "today" for both check-in and check-out
    let row: Option<(u64, Option<NaiveTime>, Option<NaiveTime>, NaiveTime)> = sqlx::query_as(
        r#"
        SELECT id, check_in, check_out, CURTIME()
        FROM attendance_logs
        WHERE employee_id = ? AND date = CURDATE()
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?;

    let (id, check_in, check_out, now) =
        row.ok_or_else(|| AppError::not_found("No check-in recorded today"))?;

    if check_out.is_some() {
        return Err(AppError::validation("Already checked out today"));
    }
    let check_in = check_in.ok_or_else(|| AppError::validation("No check-in time recorded today"))?;
    let total_hours = worked_hours(check_in, now)?;

    record_check_out(pool.get_ref(), id, now, total_hours).await?;

    info!(employee_id, total_hours, "Checked out");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "total_hours": total_hours
    })))
}

/// Stamps the check-out unless a concurrent request already did.
async fn record_check_out(
    pool: &MySqlPool,
    id: u64,
    now: NaiveTime,
    total_hours: f64,
) -> AppResult<()> {
    let affected = sqlx::query(
        r#"
        UPDATE attendance_logs
        SET check_out = ?, total_hours = ?
        WHERE id = ? AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(total_hours)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(AppError::validation("Already checked out today"));
    }
    Ok(())
}

/// HR records attendance for any employee and day.
#[utoipa::path(
    post,
    path = "/api/attendance/mark",
    request_body = MarkAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = Object, example = json!({
            "message": "Attendance recorded"
        })),
        (status = 400, description = "Invalid times or unknown employee", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse),
        (status = 409, description = "Attendance already recorded for that day", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<MarkAttendance>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let total_hours = body.total_hours()?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_logs (employee_id, date, check_in, check_out, total_hours, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(body.employee_id)
    .bind(body.date)
    .bind(body.check_in)
    .bind(body.check_out)
    .bind(total_hours)
    .bind(body.status.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Created().json(json!({
            "message": "Attendance recorded"
        }))),
        Err(e) if is_duplicate_key(&e) => Err(AppError::conflict(format!(
            "Attendance already recorded for employee {} on {}",
            body.employee_id, body.date
        ))),
        Err(e) if is_foreign_key_violation(&e) => Err(AppError::validation("Unknown employee_id")),
        Err(e) => Err(e.into()),
    }
}

fn push_filter(
    qb: &mut QueryBuilder<'_, MySql>,
    employee_id: Option<u64>,
    query: &AttendanceQuery,
) {
    if let Some(employee_id) = employee_id {
        qb.push(" AND employee_id = ").push_bind(employee_id);
    }
    if let Some(month) = query.month {
        qb.push(" AND MONTH(date) = ").push_bind(month);
    }
    if let Some(year) = query.year {
        qb.push(" AND YEAR(date) = ").push_bind(year);
    }
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance rows", body = AttendancePage),
        (status = 403, description = "No employee profile", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> AppResult<HttpResponse> {
    // employees only see their own rows
    let employee_id = if auth.has_any(REPORT_MANAGERS) {
        query.employee_id
    } else {
        Some(auth.employee_id()?)
    };
    if query.month.is_some_and(|m| !(1..=12).contains(&m)) {
        return Err(AppError::validation("month must be between 1 and 12"));
    }

    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM attendance_logs WHERE 1=1");
    push_filter(&mut count, employee_id, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(
        r#"
        SELECT id, employee_id, date, check_in, check_out, total_hours, status
        FROM attendance_logs
        WHERE 1=1
        "#,
    );
    push_filter(&mut data, employee_id, &query);
    data.push(" ORDER BY date DESC, employee_id LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let rows: Vec<Attendance> = data.build_query_as().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(window.wrap(rows, total)))
}
