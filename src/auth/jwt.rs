use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{error::AppError, model::user::User, models::Claims};

/// Issues and checks session tokens. Tokens are self-contained: nothing is
/// stored server-side, so a token stays valid until it expires.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            sub: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(AppError::internal)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected session token");
                AppError::Unauthorized("Invalid or expired token".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "asha".into(),
            password_hash: String::new(),
            role,
            full_name: None,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_carries_identity_and_role() {
        let tokens = TokenService::new("secret", Duration::hours(24));
        let u = user(Role::User);
        let claims = tokens.verify(&tokens.issue(&u).unwrap()).unwrap();
        assert_eq!(claims.user_id, u.id);
        assert_eq!(claims.sub, "asha");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn expired_token_is_rejected_even_with_a_valid_signature() {
        let tokens = TokenService::new("secret", Duration::hours(24));
        let u = user(Role::Admin);
        let issued = Utc::now() - Duration::hours(25);
        let claims = Claims {
            user_id: u.id,
            sub: u.username.clone(),
            role: u.role,
            iat: issued.timestamp(),
            exp: (issued + Duration::hours(24)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = tokens.sign(&claims).unwrap();
        assert!(matches!(tokens.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenService::new("secret", Duration::hours(1));
        let theirs = TokenService::new("other-secret", Duration::hours(1));
        let token = theirs.issue(&user(Role::Admin)).unwrap();
        assert!(ours.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        let tokens = TokenService::new("secret", Duration::hours(1));
        assert!(matches!(tokens.verify("not.a.token"), Err(AppError::Unauthorized(_))));
    }
}
