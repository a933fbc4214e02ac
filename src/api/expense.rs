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
    model::{expense::Expense, role::REPORT_MANAGERS},
};

const EXPENSE_COLUMNS: &str =
    "id, project, category, amount, expense_date, description, recorded_by, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateExpense {
    #[schema(example = "WASH-2025")]
    pub project: String,
    #[schema(example = "Travel")]
    pub category: String,
    #[schema(example = 120.5)]
    pub amount: f64,
    #[schema(example = "2025-03-10", format = "date", value_type = String)]
    pub expense_date: NaiveDate,
    pub description: Option<String>,
}

impl CreateExpense {
    fn validate(&self) -> AppResult<()> {
        if self.project.trim().is_empty() || self.category.trim().is_empty() {
            return Err(AppError::validation("project and category are required"));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(AppError::validation("amount must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ExpenseQuery {
    pub project: Option<String>,
    pub category: Option<String>,
    /// Inclusive lower bound on `expense_date`
    #[schema(value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on `expense_date`
    #[schema(value_type = Option<String>, format = "date")]
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a ExpenseQuery) {
    if let Some(project) = &query.project {
        qb.push(" AND project = ").push_bind(project);
    }
    if let Some(category) = &query.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(from) = query.from {
        qb.push(" AND expense_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND expense_date <= ").push_bind(to);
    }
}

#[utoipa::path(
    post,
    path = "/api/expenses",
    request_body = CreateExpense,
    responses(
        (status = 201, description = "Expense recorded", body = Object, example = json!({
            "message": "Expense recorded",
            "id": 1
        })),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Expenses"
)]
pub async fn create_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateExpense>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;
    payload.validate()?;

    let id = sqlx::query(
        r#"
        INSERT INTO expenses (project, category, amount, expense_date, description, recorded_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.project.trim())
    .bind(payload.category.trim())
    .bind(payload.amount)
    .bind(payload.expense_date)
    .bind(&payload.description)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(expense_id = id, by = auth.user_id, "Expense recorded");
    Ok(HttpResponse::Created().json(json!({
        "message": "Expense recorded",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/expenses",
    params(ExpenseQuery),
    responses(
        (status = 200, description = "Paginated expenses", body = ExpensePage),
        (status = 400, description = "from is after to", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Expenses"
)]
pub async fn list_expenses(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ExpenseQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::validation("from cannot be after to"));
        }
    }

    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM expenses WHERE 1=1");
    push_filter(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM expenses WHERE 1=1",
        EXPENSE_COLUMNS
    ));
    push_filter(&mut data, &query);
    data.push(" ORDER BY expense_date DESC, id DESC LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let expenses: Vec<Expense> = data.build_query_as().fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(window.wrap(expenses, total)))
}

#[utoipa::path(
    get,
    path = "/api/expenses/{id}",
    params(("id" = u64, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Expense", body = Expense),
        (status = 404, description = "Not found", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Expenses"
)]
pub async fn get_expense(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let expense = sqlx::query_as::<_, Expense>(&format!(
        "SELECT {} FROM expenses WHERE id = ?",
        EXPENSE_COLUMNS
    ))
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?;

    expense
        .map(|e| HttpResponse::Ok().json(e))
        .ok_or_else(|| AppError::not_found("Expense not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::testing::{bearer, call},
        model::role::Role,
    };
    use actix_web::{http::StatusCode, test::TestRequest};

    #[actix_web::test]
    async fn non_positive_amount_is_rejected() {
        let resp = call(
            TestRequest::post()
                .uri("/api/expenses")
                .insert_header(bearer(Role::Hr, None))
                .set_json(json!({
                    "project": "WASH-2025",
                    "category": "Travel",
                    "amount": 0.0,
                    "expense_date": "2025-03-10"
                })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn inverted_date_range_is_rejected() {
        let resp = call(
            TestRequest::get()
                .uri("/api/expenses?from=2025-04-01&to=2025-03-01")
                .insert_header(bearer(Role::Admin, None)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn employees_cannot_read_expenses() {
        let resp = call(
            TestRequest::get()
                .uri("/api/expenses/1")
                .insert_header(bearer(Role::Employee, Some(1))),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
