use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures_util::future::{Ready, ready};

use crate::{
    auth::jwt::verify_token,
    config::Config,
    error::AppError,
    model::role::Role,
    models::{Claims, TokenType},
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        let role = Role::from_id(claims.role)
            .ok_or_else(|| AppError::Unauthorized("Invalid role".into()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            employee_id: claims.employee_id,
        })
    }
}

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Result<&str, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".into()))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Authorization header must start with Bearer".into()))
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    // set by auth_middleware on protected scopes
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return Ok(user.clone());
    }

    let token = bearer_token(req)?;
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| AppError::Internal("Config missing".into()))?;

    AuthUser::try_from(verify_token(token, &config.jwt_secret)?)
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

impl AuthUser {
    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if self.has_any(roles) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!(
                "Role {} is not allowed to perform this action",
                self.role
            )))
        }
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        self.require_any(&[role])
    }

    /// The linked employee record, required for self-service endpoints.
    pub fn employee_id(&self) -> Result<u64, AppError> {
        self.employee_id
            .ok_or_else(|| AppError::forbidden("No employee profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::{PAYROLL_RUNNERS, REPORT_MANAGERS};

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            employee_id: None,
        }
    }

    #[test]
    fn role_checks() {
        assert!(user(Role::Hr).require_any(REPORT_MANAGERS).is_ok());
        assert!(matches!(
            user(Role::Hr).require_any(PAYROLL_RUNNERS),
            Err(AppError::Forbidden(_))
        ));
        assert!(user(Role::SuperAdmin).require_role(Role::SuperAdmin).is_ok());
        assert!(user(Role::Admin).require_role(Role::SuperAdmin).is_err());
    }

    #[test]
    fn missing_employee_profile_is_forbidden() {
        assert!(matches!(
            user(Role::Employee).employee_id(),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn refresh_claims_are_not_an_identity() {
        let claims = Claims {
            user_id: 1,
            sub: "u".into(),
            role: 2,
            exp: 0,
            jti: "j".into(),
            token_type: TokenType::Refresh,
            employee_id: None,
        };
        assert!(AuthUser::try_from(claims).is_err());
    }
}
