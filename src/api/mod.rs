use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{
    activity_log::ActivityLog, attendance::Attendance, beneficiary::Beneficiary,
    employee::Employee, expense::Expense, leave_request::LeaveRequest, payroll::PayrollRecord,
    report::ReportRecord,
};

pub mod activity;
pub mod attendance;
pub mod beneficiary;
pub mod employee;
pub mod expense;
pub mod leave_request;
pub mod payroll;
pub mod reports;

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;

/// Resolved page window for list endpoints; pages start at 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(self) -> u32 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn wrap<T>(self, data: Vec<T>, total: i64) -> Paginated<T> {
        Paginated {
            data,
            page: self.page,
            per_page: self.per_page,
            total,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[aliases(
    EmployeePage = Paginated<Employee>,
    LeavePage = Paginated<LeaveRequest>,
    AttendancePage = Paginated<Attendance>,
    PayrollPage = Paginated<PayrollRecord>,
    ReportPage = Paginated<ReportRecord>,
    ExpensePage = Paginated<Expense>,
    BeneficiaryPage = Paginated<Beneficiary>,
    ActivityPage = Paginated<ActivityLog>
)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[cfg(test)]
pub mod testing {
    //! Shared fixtures for handler tests. The pool is lazy and never
    //! connected, so only paths that fail before touching MySQL are tested.

    use actix_web::{
        App,
        dev::ServiceResponse,
        http::header::{AUTHORIZATION, HeaderName},
        middleware::from_fn,
        test::{self, TestRequest},
        web::{self, Data},
    };
    use sqlx::{MySqlPool, mysql::MySqlPoolOptions};

    use crate::{
        auth::{
            jwt::{TokenSubject, generate_access_token},
            middleware::auth_middleware,
        },
        config::Config,
        model::role::Role,
        routes,
        utils::uploads::UploadStore,
    };

    pub fn pool() -> Data<MySqlPool> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_lazy(&Config::for_tests().database_url)
            .expect("lazy pool");
        Data::new(pool)
    }

    pub fn config() -> Data<Config> {
        Data::new(Config::for_tests())
    }

    pub fn bearer(role: Role, employee_id: Option<u64>) -> (HeaderName, String) {
        let subject = TokenSubject {
            user_id: 7,
            username: "tester".into(),
            role: role.id(),
            employee_id,
        };
        let token = generate_access_token(&subject, &Config::for_tests().jwt_secret, 300)
            .expect("token");
        (AUTHORIZATION, format!("Bearer {}", token))
    }

    /// Runs one request through the protected API scope, without rate limits.
    pub async fn call(req: TestRequest) -> ServiceResponse {
        let config = Config::for_tests();
        let app = test::init_service(
            App::new()
                .app_data(pool())
                .app_data(Data::new(UploadStore::new(config.upload_dir.clone())))
                .app_data(Data::new(config))
                .app_data(routes::json_config())
                .app_data(routes::query_config())
                .app_data(routes::path_config())
                .service(
                    web::scope("/api")
                        .wrap(from_fn(auth_middleware))
                        .configure(routes::api_routes),
                ),
        )
        .await;
        test::call_service(&app, req.to_request()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_bounds() {
        assert_eq!(PageWindow::new(None, None), PageWindow { page: 1, per_page: 10 });
        assert_eq!(PageWindow::new(Some(0), Some(0)), PageWindow { page: 1, per_page: 1 });
        assert_eq!(PageWindow::new(Some(3), Some(500)).per_page, 100);
        assert_eq!(PageWindow::new(Some(3), Some(20)).offset(), 40);
    }
}
