use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::PageWindow,
    auth::auth::AuthUser,
    db::{insert_activity, is_duplicate_key, is_foreign_key_violation},
    error::{AppError, AppResult},
    model::{
        activity_log::NewActivity,
        employee::{Employee, EmployeeStatus},
        role::REPORT_MANAGERS,
    },
};

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, \
     department, designation, monthly_salary, join_date, status";

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "Amina")]
    pub first_name: String,
    #[schema(example = "Rahman")]
    pub last_name: String,
    #[schema(example = "amina.rahman@ngo.org", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "Programs")]
    pub department: Option<String>,
    #[schema(example = "Field Officer")]
    pub designation: Option<String>,
    #[schema(example = 3000.0)]
    pub monthly_salary: f64,
    #[schema(example = "2024-01-01", format = "date", value_type = String)]
    pub join_date: NaiveDate,
}

/// Partial update; only the fields present are written.
#[derive(Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub monthly_salary: Option<f64>,
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    pub join_date: Option<NaiveDate>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    #[schema(example = "Programs")]
    pub department: Option<String>,
    pub status: Option<EmployeeStatus>,
    /// Search by name, email or employee code
    pub search: Option<String>,
}

fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::validation("email is not valid")),
    }
}

fn validate_salary(salary: f64) -> AppResult<()> {
    if !salary.is_finite() || salary < 0.0 {
        return Err(AppError::validation("monthly_salary must be a non-negative number"));
    }
    Ok(())
}

impl CreateEmployee {
    fn validate(&self) -> AppResult<()> {
        require_text(&self.employee_code, "employee_code")?;
        require_text(&self.first_name, "first_name")?;
        require_text(&self.last_name, "last_name")?;
        validate_email(&self.email)?;
        validate_salary(self.monthly_salary)
    }
}

impl UpdateEmployee {
    fn is_empty(&self) -> bool {
        self.employee_code.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.designation.is_none()
            && self.monthly_salary.is_none()
            && self.join_date.is_none()
            && self.status.is_none()
    }

    fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::validation("No fields to update"));
        }
        if let Some(code) = &self.employee_code {
            require_text(code, "employee_code")?;
        }
        if let Some(name) = &self.first_name {
            require_text(name, "first_name")?;
        }
        if let Some(name) = &self.last_name {
            require_text(name, "last_name")?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(salary) = self.monthly_salary {
            validate_salary(salary)?;
        }
        Ok(())
    }

    fn to_query(&self, employee_id: u64) -> QueryBuilder<'_, MySql> {
        let mut qb = QueryBuilder::<MySql>::new("UPDATE employees SET ");
        let mut set = qb.separated(", ");

        if let Some(v) = &self.employee_code {
            set.push("employee_code = ").push_bind_unseparated(v.trim());
        }
        if let Some(v) = &self.first_name {
            set.push("first_name = ").push_bind_unseparated(v.trim());
        }
        if let Some(v) = &self.last_name {
            set.push("last_name = ").push_bind_unseparated(v.trim());
        }
        if let Some(v) = &self.email {
            set.push("email = ").push_bind_unseparated(v.trim());
        }
        if let Some(v) = &self.phone {
            set.push("phone = ").push_bind_unseparated(v);
        }
        if let Some(v) = &self.department {
            set.push("department = ").push_bind_unseparated(v);
        }
        if let Some(v) = &self.designation {
            set.push("designation = ").push_bind_unseparated(v);
        }
        if let Some(v) = self.monthly_salary {
            set.push("monthly_salary = ").push_bind_unseparated(v);
        }
        if let Some(v) = self.join_date {
            set.push("join_date = ").push_bind_unseparated(v);
        }
        if let Some(v) = self.status {
            set.push("status = ").push_bind_unseparated(v.as_ref().to_string());
        }

        qb.push(" WHERE id = ").push_bind(employee_id);
        qb
    }
}

fn write_error(e: sqlx::Error) -> AppError {
    if is_duplicate_key(&e) {
        AppError::conflict("employee_code or email already exists")
    } else {
        e.into()
    }
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created",
            "id": 1
        })),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Duplicate code or email", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;
    payload.validate()?;

    let id = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department, designation,
             monthly_salary, join_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(&payload.phone)
    .bind(&payload.department)
    .bind(&payload.designation)
    .bind(payload.monthly_salary)
    .bind(payload.join_date)
    .bind(EmployeeStatus::Active.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(write_error)?
    .last_insert_id();

    info!(employee_id = id, by = auth.user_id, "Employee created");
    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created",
        "id": id
    })))
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, MySql>, query: &'a EmployeeQuery) {
    if let Some(department) = &query.department {
        qb.push(" AND department = ").push_bind(department);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_ref().to_string());
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", search);
        qb.push(" AND (first_name LIKE ")
            .push_bind(like.clone())
            .push(" OR last_name LIKE ")
            .push_bind(like.clone())
            .push(" OR email LIKE ")
            .push_bind(like.clone())
            .push(" OR employee_code LIKE ")
            .push_bind(like)
            .push(")");
    }
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeePage),
        (status = 403, description = "Role not allowed", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let window = PageWindow::new(query.page, query.per_page);

    let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM employees WHERE 1=1");
    push_filter(&mut count, &query);
    let total: i64 = count.build_query_scalar().fetch_one(pool.get_ref()).await?;

    let mut data = QueryBuilder::<MySql>::new(format!(
        "SELECT {} FROM employees WHERE 1=1",
        EMPLOYEE_COLUMNS
    ));
    push_filter(&mut data, &query);
    data.push(" ORDER BY id DESC LIMIT ")
        .push_bind(window.per_page)
        .push(" OFFSET ")
        .push_bind(window.offset());

    debug!(sql = data.sql(), page = window.page, "Fetching employees");
    let employees: Vec<Employee> = data.build_query_as().fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(window.wrap(employees, total)))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Nothing to update or invalid field", body = crate::error::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdateEmployee>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;
    body.validate()?;

    let employee_id = path.into_inner();
    let mut update = body.to_query(employee_id);

    let result = update
        .build()
        .execute(pool.get_ref())
        .await
        .map_err(write_error)?;

    // MySQL reports 0 affected rows when nothing changed, so check existence
    if result.rows_affected() == 0 {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_one(pool.get_ref())
            .await?;
        if exists == 0 {
            return Err(AppError::not_found("Employee not found"));
        }
    }

    info!(employee_id, by = auth.user_id, "Employee updated");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Employee still has attendance, leave or payroll records", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => Err(AppError::not_found("Employee not found")),
        Ok(_) => {
            info!(employee_id, by = auth.user_id, "Employee deleted");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }
        Err(e) if is_foreign_key_violation(&e) => Err(AppError::conflict(
            "Employee has related records; set status to Inactive instead",
        )),
        Err(e) => Err(e.into()),
    }
}

/// Get Employee by ID. Employees may read their own record.
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Not your record", body = crate::error::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    let employee_id = path.into_inner();
    if !auth.has_any(REPORT_MANAGERS) && auth.employee_id != Some(employee_id) {
        return Err(AppError::forbidden("You may only view your own employee record"));
    }

    let employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {} FROM employees WHERE id = ?",
        EMPLOYEE_COLUMNS
    ))
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Err(AppError::not_found("Employee not found")),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LinkAccount {
    #[schema(example = 12)]
    pub user_id: u64,
}

/// Link a user account to an employee record.
///
/// The link is what lets an account check in, apply for leave and read
/// its own attendance, so only HR and admins may set it.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/account",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = LinkAccount,
    responses(
        (status = 200, description = "Account linked", body = Object, example = json!({
            "message": "Account linked successfully"
        })),
        (status = 403, description = "Insufficient role", body = crate::error::ErrorResponse),
        (status = 404, description = "User or employee not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Employee already has an account", body = crate::error::ErrorResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn link_account(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<LinkAccount>,
) -> AppResult<HttpResponse> {
    auth.require_any(REPORT_MANAGERS)?;

    let employee_id = path.into_inner();
    let user_id = body.user_id;

    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE users SET employee_id = ? WHERE id = ?")
        .bind(employee_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await;

    match result {
        Ok(res) if res.rows_affected() == 0 => {
            tx.rollback().await?;
            return Err(AppError::not_found("User not found"));
        }
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::conflict("Employee already has a linked account"));
        }
        Err(e) if is_foreign_key_violation(&e) => {
            return Err(AppError::not_found("Employee not found"));
        }
        Err(e) => return Err(e.into()),
    }

    insert_activity(
        &mut *tx,
        &NewActivity {
            user_id: auth.user_id,
            action: "employee.link_account",
            entity_type: "employee",
            entity_ref: employee_id.to_string(),
            details: Some(format!("user_id={}", user_id)),
        },
    )
    .await?;

    tx.commit().await?;

    info!(employee_id, user_id, by = auth.user_id, "Account linked to employee");
    Ok(HttpResponse::Ok().json(json!({
        "message": "Account linked successfully"
    })))
}
