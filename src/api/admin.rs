//! Admin endpoints. Every handler passes the caller's token to the admin
//! service, which rejects non-admins with 403.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::auth::SessionToken;
use super::{
    ApiError, ApiResponse, AppState, CreateUserRequest, MessageResponse, UpdateUserRequest,
};
use crate::db::{SessionSummary, User};
use crate::services::{AdminUserUpdate, NewAccount};

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state.admin_service().list_users(&token).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// POST /api/admin/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = state
        .admin_service()
        .create_user(
            &token,
            NewAccount {
                username: payload.username,
                email: payload.email,
                password: payload.password,
                full_name: payload.full_name,
            },
            payload.is_admin,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// PUT /api/admin/users/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .admin_service()
        .update_user(
            &token,
            id,
            AdminUserUpdate {
                is_active: payload.is_active,
                is_admin: payload.is_admin,
                full_name: payload.full_name,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(user)))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.admin_service().delete_user(&token, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User deleted successfully",
    ))))
}

/// GET /api/admin/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>, ApiError> {
    let sessions = state.admin_service().list_sessions(&token).await?;
    Ok(Json(ApiResponse::success(sessions)))
}

/// DELETE /api/admin/sessions/{id}
pub async fn revoke_session(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.admin_service().revoke_session(&token, id).await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Session revoked successfully",
    ))))
}
