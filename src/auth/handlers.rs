use crate::{
    auth::{auth::AuthUser, jwt::TokenService},
    error::AppError,
    model::user::{SessionUser, UserProfile},
    models::{ChangePasswordReq, LoginReqDto, LoginResponse},
    store::credentials::{CredentialStore, MIN_PASSWORD_LEN},
};
use actix_web::{HttpResponse, web};
use serde_json::json;
use tracing::{debug, error, info, instrument};

/// Login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Session token issued", body = LoginResponse),
        (status = 400, description = "Missing username or password", body = Object, example = json!({
            "error": "Username and password required"
        })),
        (status = 401, description = "Invalid credentials", body = Object, example = json!({
            "error": "Invalid credentials"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(credentials, tokens, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    credentials: web::Data<CredentialStore>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AppError> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(AppError::validation("Username and password required"));
    }

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let db_user = match credentials.find_by_username(&user.username).await? {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Invalid credentials: user inactive");
            return Err(invalid());
        }
        None => {
            info!("Invalid credentials: user not found");
            return Err(invalid());
        }
    };

    debug!(user_id = %db_user.id, "Verifying password");
    if !credentials.verify_password(&db_user, &user.password) {
        info!("Invalid credentials: password mismatch");
        return Err(invalid());
    }

    if let Err(e) = credentials.touch_last_login(&db_user).await {
        // a login still succeeds if the timestamp cannot be written
        error!(error = %e, "Failed to update last login");
    }

    let token = tokens.issue(&db_user)?;

    info!(user_id = %db_user.id, role = %db_user.role, "Login successful");

    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        user: SessionUser::from(&db_user),
    }))
}

/// Current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = Object, example = json!({
            "user": {
                "id": "6f1c7c1e-2b7e-4a57-9b1a-1f0d0b7e4a11",
                "username": "admin",
                "role": "admin",
                "fullName": "System Administrator",
                "isActive": true,
                "lastLogin": "2026-01-01T09:00:00Z",
                "createdAt": "2026-01-01T08:00:00Z"
            }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn me(
    auth: AuthUser,
    credentials: web::Data<CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let user = credentials
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "user": UserProfile::from(&user) })))
}

/// Change password
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed", body = Object, example = json!({
            "message": "Password changed successfully"
        })),
        (status = 400, description = "Missing fields or new password too short"),
        (status = 401, description = "Current password is incorrect")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
#[instrument(name = "auth_change_password", skip_all, fields(user_id = %auth.user_id))]
pub async fn change_password(
    auth: AuthUser,
    body: web::Json<ChangePasswordReq>,
    credentials: web::Data<CredentialStore>,
) -> Result<HttpResponse, AppError> {
    if body.current_password.is_empty() || body.new_password.is_empty() {
        return Err(AppError::validation("Current and new password required"));
    }

    if body.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = credentials
        .find_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !credentials.verify_password(&user, &body.current_password) {
        info!("Password change refused: current password mismatch");
        return Err(AppError::Unauthorized("Current password is incorrect".to_string()));
    }

    credentials.set_password(&user, &body.new_password).await?;

    info!("Password changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}

/// Logout. Tokens are not tracked server-side; the client drops its copy.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Acknowledged", body = Object, example = json!({
            "message": "Logged out successfully"
        })),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn logout(auth: AuthUser) -> HttpResponse {
    debug!(user_id = %auth.user_id, "Logout acknowledged");
    HttpResponse::Ok().json(json!({ "message": "Logged out successfully" }))
}
