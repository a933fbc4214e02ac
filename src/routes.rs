use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{error::JsonPayloadError, middleware::from_fn, web};
use std::sync::Arc;

use crate::{
    api::{activity, attendance, beneficiary, employee, expense, leave_request, payroll, reports},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::AppError,
};

/// Extractor failures are answered like any other validation error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = match &err {
            JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
            other => format!("Invalid JSON body: {}", other),
        };
        AppError::Validation(message).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid query: {}", err)).into())
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::validation(format!("Invalid path: {}", err)).into())
}

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

/// Protected resources, mounted under `API_PREFIX` behind `auth_middleware`.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reports")
            // /reports
            .service(web::resource("").route(web::get().to(reports::list_reports)))
            // /reports/status: read status, or lock
            .service(
                web::resource("/status")
                    .route(web::get().to(reports::get_report_status))
                    .route(web::post().to(reports::lock_report)),
            )
            .service(web::resource("/submit").route(web::post().to(reports::submit_report)))
            .service(web::resource("/approve").route(web::post().to(reports::approve_report)))
            .service(web::resource("/audit").route(web::get().to(reports::report_audit))),
    )
    .service(
        web::scope("/payroll")
            // /payroll
            .service(web::resource("").route(web::get().to(payroll::list_payrolls)))
            .service(web::resource("/generate").route(web::post().to(payroll::generate_payroll)))
            // /payroll/report/{month}/{year}
            .service(
                web::resource("/report/{month}/{year}")
                    .route(web::get().to(payroll::payroll_report)),
            )
            // /payroll/{id}
            .service(web::resource("/{id}").route(web::get().to(payroll::get_payroll))),
    )
    .service(
        web::scope("/attendance")
            // /attendance
            .service(
                web::resource("")
                    .route(web::post().to(attendance::check_in))
                    .route(web::put().to(attendance::check_out))
                    .route(web::get().to(attendance::list_attendance)),
            )
            .service(web::resource("/mark").route(web::post().to(attendance::mark_attendance))),
    )
    .service(
        web::scope("/employee")
            // /employee
            .service(
                web::resource("")
                    .route(web::post().to(employee::create_employee))
                    .route(web::get().to(employee::list_employees)),
            )
            // /employee/{id}
            .service(
                web::resource("/{id}")
                    .route(web::put().to(employee::update_employee))
                    .route(web::get().to(employee::get_employee))
                    .route(web::delete().to(employee::delete_employee)),
            )
            // /employee/{id}/account
            .service(
                web::resource("/{id}/account").route(web::put().to(employee::link_account)),
            ),
    )
    .service(
        web::scope("/leave")
            // /leave
            .service(
                web::resource("")
                    .route(web::get().to(leave_request::leave_list))
                    .route(web::post().to(leave_request::create_leave)),
            )
            // /leave/{id}
            .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
            // /leave/{id}/approve
            .service(
                web::resource("/{id}/approve").route(web::put().to(leave_request::approve_leave)),
            )
            // /leave/{id}/reject
            .service(
                web::resource("/{id}/reject").route(web::put().to(leave_request::reject_leave)),
            ),
    )
    .service(
        web::scope("/expenses")
            .service(
                web::resource("")
                    .route(web::post().to(expense::create_expense))
                    .route(web::get().to(expense::list_expenses)),
            )
            .service(web::resource("/{id}").route(web::get().to(expense::get_expense))),
    )
    .service(
        web::scope("/beneficiaries")
            .service(
                web::resource("")
                    .route(web::post().to(beneficiary::create_beneficiary))
                    .route(web::get().to(beneficiary::list_beneficiaries)),
            )
            .service(web::resource("/{id}").route(web::get().to(beneficiary::get_beneficiary))),
    )
    .service(web::resource("/activity").route(web::get().to(activity::list_activity)));
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let register_limiter = Arc::new(build_limiter(config.rate_register_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(register_limiter)
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .configure(api_routes),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns new access_token and rotated refresh_token

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_accepts_zero_rate() {
        // a zero rate would divide by zero
        let _ = build_limiter(0);
        let _ = build_limiter(60);
    }
}
