use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        auth::bearer_token,
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    db::is_duplicate_key,
    error::{AppError, AppResult},
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, TokenPair, TokenType, UserReq},
};

const MIN_PASSWORD_LEN: usize = 8;

async fn find_user(pool: &MySqlPool, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn find_user_by_id(pool: &MySqlPool, id: u64) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

impl From<&User> for TokenSubject {
    fn from(user: &User) -> Self {
        TokenSubject {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role_id,
            employee_id: user.employee_id,
        }
    }
}

/// Issues an access/refresh pair and records the refresh `jti`.
async fn issue_tokens<'e, E>(
    executor: E,
    subject: &TokenSubject,
    config: &Config,
) -> AppResult<TokenPair>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| AppError::Internal(format!("failed to sign access token: {}", e)))?;
    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(|e| AppError::Internal(format!("failed to sign refresh token: {}", e)))?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(executor)
    .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> AppResult<Claims> {
    let claims = verify_token(bearer_token(req)?, &config.jwt_secret)?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }
    Ok(claims)
}

/// Self-registration. New accounts always get the `Employee` role and no
/// employee link; HR links and promotes them afterwards.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = UserReq,
    responses(
        (status = 201, description = "User registered", body = Object, example = json!({
            "message": "User registered successfully"
        })),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 409, description = "Username already taken", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(username = %user.username))]
pub async fn register(
    user: web::Json<UserReq>,
    pool: web::Data<MySqlPool>,
) -> AppResult<HttpResponse> {
    let username = user.username.trim().to_lowercase();

    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation("Username and password must not be empty"));
    }
    if user.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hashed = hash_password(&user.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id) VALUES (?, ?, ?)"#,
    )
    .bind(&username)
    .bind(hashed)
    .bind(Role::Employee.id())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!("User registered");
            Ok(HttpResponse::Created().json(json!({
                "message": "User registered successfully"
            })))
        }
        Err(e) if is_duplicate_key(&e) => Err(AppError::conflict("Username already taken")),
        Err(e) => Err(e.into()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing credentials", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    info!("Login request received");

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Err(AppError::validation("Username or password required"));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let db_user = match find_user(pool.get_ref(), &username).await? {
        Some(u) => u,
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid());
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid());
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return Err(AppError::Unauthorized("Account is disabled".into()));
    }

    let tokens = issue_tokens(pool.get_ref(), &TokenSubject::from(&db_user), &config).await?;

    // not fatal for the login itself
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

/// Rotates a refresh token: the presented one is revoked and a new pair is
/// issued in the same transaction.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid, revoked or expired refresh token", body = crate::error::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims = refresh_claims(&req, &config)?;

    let mut tx = pool.begin().await?;

    let record: Option<(u64, bool)> = sqlx::query_as(
        r#"
        SELECT id, revoked
        FROM refresh_tokens
        WHERE jti = ? AND expires_at > NOW()
        FOR UPDATE
        "#,
    )
    .bind(&claims.jti)
    .fetch_optional(&mut *tx)
    .await?;

    let token_id = match record {
        Some((id, false)) => id,
        _ => {
            warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
            return Err(AppError::Unauthorized("Refresh token revoked".into()));
        }
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = ?")
        .bind(token_id)
        .execute(&mut *tx)
        .await?;

    // pick up role changes and deactivation since the last login
    let user = find_user_by_id(pool.get_ref(), claims.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Account is disabled".into()))?;

    let tokens = issue_tokens(&mut *tx, &TokenSubject::from(&user), &config).await?;
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revokes the presented refresh token. Always answers 204.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> AppResult<HttpResponse> {
    let claims = match refresh_claims(&req, &config) {
        Ok(c) => c,
        Err(_) => return Ok(HttpResponse::NoContent().finish()),
    };

    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing;
    use actix_web::{App, http::StatusCode, test};

    #[actix_web::test]
    async fn register_rejects_blank_credentials() {
        let app = test::init_service(
            App::new()
                .app_data(testing::pool())
                .route("/register", web::post().to(register)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(json!({"username": "  ", "password": ""}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn register_rejects_short_password() {
        let app = test::init_service(
            App::new()
                .app_data(testing::pool())
                .route("/register", web::post().to(register)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(json!({"username": "amina", "password": "short"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn register_rejects_employee_link() {
        let app = test::init_service(
            App::new()
                .app_data(testing::pool())
                .app_data(crate::routes::json_config())
                .route("/register", web::post().to(register)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(json!({
                "username": "stranger",
                "password": "longenough1",
                "employee_id": 1
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[::core::prelude::v1::test]
    fn register_body_has_no_employee_link() {
        let body = json!({"username": "amina", "password": "longenough1"});
        assert!(serde_json::from_value::<UserReq>(body).is_ok());

        let body = json!({"username": "amina", "password": "longenough1", "employee_id": 1});
        assert!(serde_json::from_value::<UserReq>(body).is_err());
    }

    #[actix_web::test]
    async fn refresh_requires_a_refresh_token() {
        let app = test::init_service(
            App::new()
                .app_data(testing::pool())
                .app_data(testing::config())
                .route("/refresh", web::post().to(refresh_token)),
        )
        .await;

        // an access token must not be accepted for rotation
        let req = test::TestRequest::post()
            .uri("/refresh")
            .insert_header(testing::bearer(Role::Admin, None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn logout_without_token_is_no_content() {
        let app = test::init_service(
            App::new()
                .app_data(testing::pool())
                .app_data(testing::config())
                .route("/logout", web::post().to(logout)),
        )
        .await;

        let req = test::TestRequest::post().uri("/logout").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
