// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        role::Role,
        user::{LoginRequest, UserStatus},
    },
    state::Stores,
    utils::{hash::verify_password, jwt::sign_jwt},
};

/// Authenticates a user and returns a JWT token.
///
/// Verifies the username and password against the user store.
/// The token carries the role tag and, when the user has one, the permission override list.
/// `role_name` is null for a role tag the service does not know.
pub async fn login(
    State(stores): State<Stores>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = stores
        .users
        .find_by_username(&payload.username)
        .await
        .map_err(|e| {
            tracing::error!("Login lookup failed: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::AuthError("User not found".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    if user.status != UserStatus::Active {
        tracing::info!("Rejected login for {:?} account '{}'", user.status, user.username);
        return Err(AppError::Forbidden("Account is not active".to_string()));
    }

    let token = sign_jwt(
        user.id,
        &user.role,
        user.permissions.clone(),
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
        "role_name": Role::parse(&user.role).map(Role::display_name),
        "permissions": user.permissions,
    })))
}
