// src/handlers/access.rs

use axum::{
    Extension, Json,
    extract::{Path, Query},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    utils::{
        jwt::Claims,
        permissions::{
            can_access_menu_for_role_name, grouped_permission_catalog,
            has_permission_for_role_name, menu_items_for_role_name,
        },
    },
};

/// Menu entries the caller may reach, in configuration order.
/// An unknown role gets an empty menu rather than an error.
pub async fn get_menu(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(menu_items_for_role_name(
        &claims.role,
        claims.permissions.as_deref(),
    ))
}

/// Whether the caller may open one menu entry.
pub async fn check_menu(
    Extension(claims): Extension<Claims>,
    Path(menu_id): Path<String>,
) -> impl IntoResponse {
    let allowed =
        can_access_menu_for_role_name(&claims.role, &menu_id, claims.permissions.as_deref());
    Json(json!({ "menu_id": menu_id, "allowed": allowed }))
}

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    pub permission: String,
}

/// Whether the caller may perform an action.
pub async fn check_permission(
    Extension(claims): Extension<Claims>,
    Query(query): Query<PermissionQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.permission.trim().is_empty() {
        return Err(AppError::BadRequest("permission must not be empty".to_string()));
    }
    let allowed = has_permission_for_role_name(
        &claims.role,
        &query.permission,
        claims.permissions.as_deref(),
    );
    Ok(Json(json!({ "permission": query.permission, "allowed": allowed })))
}

/// Permission catalog grouped by display category.
pub async fn get_permission_catalog() -> impl IntoResponse {
    Json(grouped_permission_catalog())
}
