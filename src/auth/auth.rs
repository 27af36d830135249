use crate::{error::AppError, model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};
use uuid::Uuid;

/// Caller identity resolved by `auth_middleware` from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("No authentication token provided".into())),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".into()))
        }
    }

    /// Any known role.
    pub fn require_admin_or_user(&self) -> Result<(), AppError> {
        if matches!(self.role, Role::Admin | Role::User) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "someone".into(),
            role,
        }
    }

    #[test]
    fn admin_guard() {
        assert!(caller(Role::Admin).require_admin().is_ok());
        assert!(matches!(
            caller(Role::User).require_admin(),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_or_user_guard_admits_both_roles() {
        assert!(caller(Role::Admin).require_admin_or_user().is_ok());
        assert!(caller(Role::User).require_admin_or_user().is_ok());
    }
}
