use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use uuid::Uuid;

use mentorhub_auth::{AuthenticatedUser, RequireAdmin};
use mentorhub_common::{ApiResponse, AppError, Page};

use crate::{
    models::{
        AdminMentorQuery, AdminMentorRequest, AdminSessionQuery, AdminSessionSummary,
        AvailabilityQuery, AvailabilityResponse, BookSessionRequest, DashboardCounts,
        DirectoryQuery, MenteeDashboard, MentorApplicationRequest, MentorDashboard,
        MentorProfileUpdate, MentorResponse, SessionResponse, SetStatusRequest, Skill,
        SkillRequest,
    },
    AppState,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub async fn health_check() -> ApiResult<String> {
    ok("Meetings service is healthy".to_string())
}

// Public directory

pub async fn list_mentors(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> ApiResult<Page<MentorResponse>> {
    ok(state.mentor_service.directory(query).await?)
}

pub async fn get_mentor(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.public_mentor(mentor_id).await?)
}

pub async fn mentor_availability(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityResponse> {
    ok(state.booking_service.availability(mentor_id, query.date).await?)
}

pub async fn list_skills(State(state): State<AppState>) -> ApiResult<Vec<Skill>> {
    ok(state.mentor_service.list_skills().await?)
}

// Mentee booking flow

pub async fn book_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(mentor_id): Path<Uuid>,
    Json(request): Json<BookSessionRequest>,
) -> ApiResult<SessionResponse> {
    let session = state
        .booking_service
        .book_session(user.user_id, mentor_id, request)
        .await?;
    ok(session.into())
}

pub async fn pay_for_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    let session = state
        .booking_service
        .pay_for_session(user.user_id, session_id)
        .await?;
    ok(session.into())
}

pub async fn session_confirmation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    ok(state.booking_service.session_for_mentee(user.user_id, session_id).await?)
}

pub async fn mentee_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<MenteeDashboard> {
    ok(state.booking_service.mentee_dashboard(user.user_id).await?)
}

// Mentor self-service

pub async fn apply_as_mentor(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<MentorApplicationRequest>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.apply(user.user_id, request).await?)
}

pub async fn mentor_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.own_profile(user.user_id).await?)
}

pub async fn edit_mentor_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(update): Json<MentorProfileUpdate>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.edit_own_profile(user.user_id, update).await?)
}

pub async fn mentor_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<MentorDashboard> {
    ok(state.booking_service.mentor_dashboard(user.user_id).await?)
}

pub async fn mentor_session_detail(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    ok(state
        .booking_service
        .mentor_session_detail(user.user_id, session_id)
        .await?)
}

pub async fn accept_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionResponse> {
    let session = state
        .booking_service
        .accept_session(user.user_id, session_id)
        .await?;
    ok(session.into())
}

pub async fn mentor_set_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<SessionResponse> {
    let session = state
        .booking_service
        .mentor_set_status(user.user_id, session_id, &request.action)
        .await?;
    ok(session.into())
}

// Administration

pub async fn admin_dashboard(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<DashboardCounts> {
    ok(state.mentor_service.dashboard_counts().await?)
}

pub async fn admin_sessions(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<AdminSessionQuery>,
) -> ApiResult<Page<AdminSessionSummary>> {
    ok(state.booking_service.admin_sessions(query).await?)
}

pub async fn admin_set_session_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> ApiResult<SessionResponse> {
    let session = state
        .booking_service
        .admin_set_status(admin.user_id, session_id, request)
        .await?;
    ok(session.into())
}

pub async fn admin_mentors(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<AdminMentorQuery>,
) -> ApiResult<Page<MentorResponse>> {
    ok(state.mentor_service.admin_list(query).await?)
}

pub async fn admin_add_mentor(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(request): Json<AdminMentorRequest>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.admin_add(request).await?)
}

pub async fn admin_edit_mentor(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(mentor_id): Path<Uuid>,
    Json(request): Json<AdminMentorRequest>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.admin_edit(mentor_id, request).await?)
}

pub async fn admin_approve_mentor(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.approve(mentor_id).await?)
}

pub async fn admin_reject_mentor(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<MentorResponse> {
    ok(state.mentor_service.reject(mentor_id).await?)
}

pub async fn admin_delete_mentor(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(mentor_id): Path<Uuid>,
) -> ApiResult<String> {
    state.mentor_service.delete(mentor_id).await?;
    ok("Mentor deleted".to_string())
}

pub async fn admin_skills(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> ApiResult<Vec<Skill>> {
    ok(state.mentor_service.list_skills().await?)
}

pub async fn admin_add_skill(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Json(request): Json<SkillRequest>,
) -> ApiResult<Skill> {
    ok(state.mentor_service.add_skill(request).await?)
}

pub async fn admin_edit_skill(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(skill_id): Path<Uuid>,
    Json(request): Json<SkillRequest>,
) -> ApiResult<Skill> {
    ok(state.mentor_service.edit_skill(skill_id, request).await?)
}

pub async fn admin_delete_skill(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(skill_id): Path<Uuid>,
) -> ApiResult<String> {
    state.mentor_service.delete_skill(skill_id).await?;
    ok("Skill deleted".to_string())
}
