use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use mentorhub_common::{AppError, ExperienceLevel, UserRole};
use mentorhub_database::{MenteeProfileRow, UserRow};

// Request/Response DTOs

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 150, message = "Please fill in all fields."))]
    pub name: String,

    #[validate(length(min = 1, max = 150, message = "Please fill in all fields."))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub roles: Vec<UserRole>,
    pub created_at: DateTime<Utc>,
}

impl UserInfo {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&UserRole::Admin)
    }
}

impl From<UserRow> for UserInfo {
    fn from(row: UserRow) -> Self {
        Self {
            roles: parse_roles(&row.roles),
            user_id: row.user_id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
    /// Set when a non-admin user has not created a mentee profile yet.
    pub needs_mentee_profile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Either field identifies the account; the username wins when both are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenteeProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub interests: String,
    pub current_level: ExperienceLevel,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MenteeProfileRow> for MenteeProfile {
    type Error = AppError;

    fn try_from(row: MenteeProfileRow) -> Result<Self, Self::Error> {
        let current_level = row
            .current_level
            .parse::<ExperienceLevel>()
            .map_err(AppError::Internal)?;

        Ok(Self {
            user_id: row.user_id,
            full_name: row.full_name,
            interests: row.interests,
            current_level,
            goal: row.goal,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenteeProfileView {
    #[serde(flatten)]
    pub profile: MenteeProfile,
    /// True when this request created the profile.
    pub created: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MenteeProfileUpdate {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters."))]
    pub full_name: Option<String>,
    pub interests: Option<String>,
    pub current_level: Option<ExperienceLevel>,
    pub goal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AdminUserUpdate {
    #[validate(length(max = 150, message = "Username must be at most 150 characters."))]
    pub username: Option<String>,
    /// An empty string clears the address.
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub is_admin: Option<bool>,
}

/// Unknown role strings are dropped rather than failing the whole row.
pub fn parse_roles(roles: &[String]) -> Vec<UserRole> {
    roles.iter().filter_map(|role| role.parse().ok()).collect()
}

pub fn role_strings(roles: &[UserRole]) -> Vec<String> {
    roles.iter().map(|role| role.as_str().to_string()).collect()
}

/// Grants or revokes the admin role, leaving the other roles untouched.
pub fn with_admin_role(mut roles: Vec<UserRole>, is_admin: bool) -> Vec<UserRole> {
    roles.retain(|role| *role != UserRole::Admin);
    if is_admin {
        roles.push(UserRole::Admin);
    }
    if roles.is_empty() {
        roles.push(UserRole::Mentee);
    }
    roles
}
