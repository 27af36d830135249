use crate::auth::auth::AuthUser;
use crate::auth::jwt::TokenService;
use crate::error::AppError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

fn reject(req: ServiceRequest, err: AppError) -> ServiceResponse<BoxBody> {
    req.into_response(err.error_response())
}

/// Authorization gate: bearer token in, `AuthUser` in the request
/// extensions out. Every failure is a 401 with a JSON body.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let tokens = req
        .app_data::<Data<TokenService>>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("Token service missing"))?;

    let header_value = req
        .headers()
        .get("Authorization")
        .map(|h| h.to_str().map(str::to_owned));

    let header_value = match header_value {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            let err = AppError::Unauthorized("Invalid Authorization header encoding".into());
            return Ok(reject(req, err));
        }
        None => {
            let err = AppError::Unauthorized("No authentication token provided".into());
            return Ok(reject(req, err));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) if !t.trim().is_empty() => t.trim(),
        _ => {
            let err = AppError::Unauthorized("No authentication token provided".into());
            return Ok(reject(req, err));
        }
    };

    let claims = match tokens.verify(token) {
        Ok(c) => c,
        Err(err) => return Ok(reject(req, err)),
    };

    req.extensions_mut().insert(AuthUser::from(claims));

    next.call(req).await
}
