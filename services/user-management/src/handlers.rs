use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use mentorhub_auth::{AuthenticatedUser, RequireAdmin};
use mentorhub_common::{ApiResponse, AppError, Page};

use crate::models::*;
use crate::services::{AppState, UserService};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

// Health check
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("User Management Service is healthy".to_string()))
}

// Accounts

pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<UserInfo> {
    let user = UserService::new(&state).signup(request).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let response = UserService::new(&state).login(request).await?;
    Ok(Json(ApiResponse::success(response)))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<UserInfo> {
    let info = UserService::new(&state).current_user(user.user_id).await?;
    Ok(Json(ApiResponse::success(info)))
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<String> {
    UserService::new(&state)
        .change_password(user.user_id, request)
        .await?;
    Ok(Json(ApiResponse::success(
        "Your password has been changed successfully.".to_string(),
    )))
}

// Password reset

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<String> {
    let email = UserService::new(&state).forgot_password(request).await?;
    Ok(Json(ApiResponse::success(format!(
        "Password reset link has been sent to {}. Please check your email.",
        email
    ))))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<String> {
    UserService::new(&state).reset_password(&token, request).await?;
    Ok(Json(ApiResponse::success(
        "Your password has been reset successfully. Please log in with your new password.".to_string(),
    )))
}

// Mentee profile

pub async fn get_mentee_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<MenteeProfileView> {
    let profile = UserService::new(&state).mentee_profile(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn edit_mentee_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(update): Json<MenteeProfileUpdate>,
) -> ApiResult<MenteeProfileView> {
    let profile = UserService::new(&state)
        .edit_mentee_profile(user.user_id, update)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

// Administration

pub async fn admin_users(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<AdminUserQuery>,
) -> ApiResult<Page<UserInfo>> {
    let users = UserService::new(&state).list_users(query).await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn admin_edit_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<Uuid>,
    Json(update): Json<AdminUserUpdate>,
) -> ApiResult<UserInfo> {
    let user = UserService::new(&state)
        .edit_user(admin.user_id, user_id, update)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn admin_delete_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(user_id): Path<Uuid>,
) -> ApiResult<String> {
    let message = UserService::new(&state)
        .delete_user(admin.user_id, user_id)
        .await?;
    Ok(Json(ApiResponse::success(message)))
}
