use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use axum::extract::FromRef;

use mentorhub_auth::{JwtService, PasswordService, MIN_PASSWORD_LENGTH};
use mentorhub_common::{AppError, Page, PageRequest, UserRole};
use mentorhub_database::{
    is_any_unique_violation, is_unique_violation, MenteeProfileRow, PasswordResetTokenRow, UserRow,
};
use mentorhub_mailer::NotificationOutbox;

use crate::config::UserManagementConfig;
use crate::models::*;
use crate::password_reset::{generate_reset_token, reset_email, reset_url, token_is_usable};

pub const USER_NOT_FOUND: &str = "User not found";
const USERNAME_TAKEN: &str = "Username already exists. Please choose a different one.";
const EMAIL_TAKEN: &str = "Email address already exists. Please use a different email.";
const INVALID_CREDENTIALS: &str = "Invalid username or password. Please try again.";
pub const NO_MATCHING_USER: &str = "No user found with the provided information.";
pub const INVALID_RESET_LINK: &str = "Invalid reset link.";
pub const RESET_LINK_EXPIRED: &str = "This reset link has expired or been used. Please request a new one.";

const USERNAME_CONSTRAINT: &str = "users_username_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

const USER_COLUMNS: &str =
    "user_id, username, email, first_name, roles, hashed_password, created_at, updated_at";

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_service: JwtService,
    pub config: UserManagementConfig,
    pub outbox: NotificationOutbox,
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_service.clone()
    }
}

impl AppState {
    pub fn new(db_pool: PgPool, config: UserManagementConfig, outbox: NotificationOutbox) -> Self {
        Self {
            jwt_service: JwtService::new(config.jwt.clone()),
            db_pool,
            config,
            outbox,
        }
    }
}

/// Checks a signup form in the order a user fixes it: completeness, email,
/// password match, then password length.
pub fn validate_signup(request: &SignupRequest) -> Result<(), AppError> {
    let blank = [
        &request.name,
        &request.username,
        &request.email,
        &request.password,
        &request.confirm_password,
    ]
    .iter()
    .any(|field| field.trim().is_empty());
    if blank {
        return Err(AppError::Validation("Please fill in all fields.".to_string()));
    }

    request.validate()?;
    PasswordService::validate_new_password(&request.password, &request.confirm_password)
}

/// Form checks for a password change that do not need the stored hash.
pub fn validate_password_change(request: &ChangePasswordRequest) -> Result<(), AppError> {
    if request.old_password.is_empty() || request.new_password.is_empty() || request.confirm_password.is_empty() {
        return Err(AppError::Validation("Please fill in all password fields.".to_string()));
    }
    if request.new_password != request.confirm_password {
        return Err(AppError::Validation("New passwords do not match.".to_string()));
    }
    if request.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "New password must be at least {} characters long.",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Form checks for choosing a new password from a reset link.
pub fn validate_password_reset(request: &ResetPasswordRequest) -> Result<(), AppError> {
    if request.password.is_empty() || request.confirm_password.is_empty() {
        return Err(AppError::Validation("Please fill in all fields.".to_string()));
    }
    PasswordService::validate_new_password(&request.password, &request.confirm_password)
}

fn map_user_write_error(error: sqlx::Error) -> AppError {
    if is_unique_violation(&error, USERNAME_CONSTRAINT) && !is_unique_violation(&error, EMAIL_CONSTRAINT) {
        AppError::Conflict(USERNAME_TAKEN.to_string())
    } else if is_unique_violation(&error, EMAIL_CONSTRAINT) && !is_unique_violation(&error, USERNAME_CONSTRAINT) {
        AppError::Conflict(EMAIL_TAKEN.to_string())
    } else if is_any_unique_violation(&error) {
        AppError::Conflict("User with this username or email already exists.".to_string())
    } else {
        AppError::Database(error)
    }
}

pub struct UserService {
    db_pool: PgPool,
    jwt_service: JwtService,
    config: UserManagementConfig,
    outbox: NotificationOutbox,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db_pool: state.db_pool.clone(),
            jwt_service: state.jwt_service.clone(),
            config: state.config.clone(),
            outbox: state.outbox.clone(),
        }
    }

    // Accounts

    pub async fn signup(&self, request: SignupRequest) -> Result<UserInfo, AppError> {
        validate_signup(&request)?;
        let username = request.username.trim().to_string();
        let email = request.email.trim().to_string();

        if self.username_taken(&username, None).await? {
            return Err(AppError::Conflict(USERNAME_TAKEN.to_string()));
        }
        if self.email_taken(&email, None).await? {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let hashed_password = PasswordService::hash_password(&request.password)?;
        let user = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (user_id, username, email, first_name, roles, hashed_password)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&username)
        .bind(&email)
        .bind(request.name.trim())
        .bind(role_strings(&[UserRole::Mentee]))
        .bind(&hashed_password)
        .fetch_one(&self.db_pool)
        .await
        .map_err(map_user_write_error)?;

        tracing::info!(user_id = %user.user_id, username = %user.username, "user signed up");
        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        if request.username.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::Validation("Please fill in all fields.".to_string()));
        }

        let user = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(request.username.trim())
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| AppError::Authentication(INVALID_CREDENTIALS.to_string()))?;

        if !PasswordService::verify_password(&request.password, &user.hashed_password) {
            tracing::debug!(username = %user.username, "login rejected");
            return Err(AppError::Authentication(INVALID_CREDENTIALS.to_string()));
        }

        let info = UserInfo::from(user);
        let token = self
            .jwt_service
            .issue(info.user_id, &info.username, &info.email, info.roles.clone())?;
        let needs_mentee_profile = !info.is_admin() && !self.has_mentee_profile(info.user_id).await?;

        tracing::info!(user_id = %info.user_id, "user logged in");
        Ok(AuthResponse {
            token,
            expires_at: Utc::now() + Duration::hours(self.config.jwt.expiration_hours as i64),
            user: info,
            needs_mentee_profile,
        })
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserInfo, AppError> {
        Ok(self.user_row(user_id).await?.into())
    }

    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> Result<(), AppError> {
        let incomplete = [&request.old_password, &request.new_password, &request.confirm_password]
            .iter()
            .any(|field| field.is_empty());
        if incomplete {
            return validate_password_change(&request);
        }

        let user = self.user_row(user_id).await?;
        if !PasswordService::verify_password(&request.old_password, &user.hashed_password) {
            return Err(AppError::Validation("Old password is incorrect.".to_string()));
        }
        validate_password_change(&request)?;

        let hashed_password = PasswordService::hash_password(&request.new_password)?;
        sqlx::query("UPDATE users SET hashed_password = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(&hashed_password)
            .bind(user_id)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(user_id = %user_id, "password changed");
        Ok(())
    }

    // Password reset

    /// Issues a fresh reset token, replacing any earlier one, and queues the
    /// reset email. Returns the address it was sent to.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<String, AppError> {
        let username = request.username.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let email = request.email.as_deref().map(str::trim).filter(|v| !v.is_empty());

        let user = match (username, email) {
            (Some(username), _) => {
                sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS))
                    .bind(username)
                    .fetch_optional(&self.db_pool)
                    .await?
            }
            (None, Some(email)) => {
                sqlx::query_as::<_, UserRow>(&format!(
                    "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
                    USER_COLUMNS
                ))
                .bind(email)
                .fetch_optional(&self.db_pool)
                .await?
            }
            (None, None) => {
                return Err(AppError::Validation("Please provide either username or email.".to_string()));
            }
        }
        .ok_or_else(|| AppError::NotFound(NO_MATCHING_USER.to_string()))?;

        if user.email.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "User '{}' does not have an email address registered. Please contact support for password reset assistance.",
                user.username
            )));
        }

        let token = generate_reset_token();
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (user_id, token, used, created_at)
            VALUES ($1, $2, FALSE, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET token = EXCLUDED.token, used = FALSE, created_at = NOW()
            "#,
        )
        .bind(user.user_id)
        .bind(&token)
        .execute(&self.db_pool)
        .await?;

        let url = reset_url(&self.config.accounts.public_base_url, &token);
        self.outbox.enqueue(reset_email(&user, &url, self.reset_ttl()));

        tracing::info!(user_id = %user.user_id, "password reset requested");
        Ok(user.email)
    }

    /// Sets a new password from a reset link. The token is consumed in the
    /// same transaction, so it works at most once.
    pub async fn reset_password(&self, token: &str, request: ResetPasswordRequest) -> Result<(), AppError> {
        let row = sqlx::query_as::<_, PasswordResetTokenRow>("SELECT * FROM password_reset_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound(INVALID_RESET_LINK.to_string()))?;

        if !token_is_usable(&row, Utc::now(), self.reset_ttl()) {
            return Err(AppError::Validation(RESET_LINK_EXPIRED.to_string()));
        }
        validate_password_reset(&request)?;
        let hashed_password = PasswordService::hash_password(&request.password)?;

        let mut tx = self.db_pool.begin().await?;
        let consumed: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens
            SET used = TRUE
            WHERE token = $1 AND NOT used AND created_at > NOW() - make_interval(mins => $2)
            RETURNING user_id
            "#,
        )
        .bind(token)
        .bind(self.config.accounts.reset_token_ttl_minutes as i32)
        .fetch_optional(&mut *tx)
        .await?;
        let user_id = consumed.ok_or_else(|| AppError::Validation(RESET_LINK_EXPIRED.to_string()))?;

        sqlx::query("UPDATE users SET hashed_password = $1, updated_at = NOW() WHERE user_id = $2")
            .bind(&hashed_password)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user_id, "password reset completed");
        Ok(())
    }

    fn reset_ttl(&self) -> Duration {
        Duration::minutes(self.config.accounts.reset_token_ttl_minutes)
    }

    // Mentee profile

    /// Returns the caller's mentee profile, creating a default one on first
    /// access.
    pub async fn mentee_profile(&self, user_id: Uuid) -> Result<MenteeProfileView, AppError> {
        let user = self.user_row(user_id).await?;
        let default_name = if user.first_name.trim().is_empty() {
            user.username.clone()
        } else {
            user.first_name.clone()
        };

        let inserted = sqlx::query_as::<_, MenteeProfileRow>(
            r#"
            INSERT INTO mentee_profiles (user_id, full_name)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&default_name)
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(row) = inserted {
            tracing::info!(user_id = %user_id, "mentee profile created");
            return Ok(MenteeProfileView {
                profile: row.try_into()?,
                created: true,
            });
        }

        let row = sqlx::query_as::<_, MenteeProfileRow>("SELECT * FROM mentee_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(MenteeProfileView {
            profile: row.try_into()?,
            created: false,
        })
    }

    pub async fn edit_mentee_profile(
        &self,
        user_id: Uuid,
        update: MenteeProfileUpdate,
    ) -> Result<MenteeProfileView, AppError> {
        update.validate()?;
        let MenteeProfileView { mut profile, created } = self.mentee_profile(user_id).await?;

        if let Some(full_name) = update.full_name.as_deref().map(str::trim) {
            if full_name.is_empty() {
                return Err(AppError::Validation("Full name must be 1 to 100 characters.".to_string()));
            }
            profile.full_name = full_name.to_string();
        }
        if let Some(interests) = update.interests {
            profile.interests = interests;
        }
        if let Some(level) = update.current_level {
            profile.current_level = level;
        }
        if let Some(goal) = update.goal {
            profile.goal = goal;
        }

        let row = sqlx::query_as::<_, MenteeProfileRow>(
            r#"
            UPDATE mentee_profiles
            SET full_name = $1, interests = $2, current_level = $3, goal = $4, updated_at = NOW()
            WHERE user_id = $5
            RETURNING *
            "#,
        )
        .bind(&profile.full_name)
        .bind(&profile.interests)
        .bind(profile.current_level.as_str())
        .bind(&profile.goal)
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(user_id = %user_id, "mentee profile updated");
        Ok(MenteeProfileView {
            profile: row.try_into()?,
            created,
        })
    }

    // Administration

    pub async fn list_users(&self, query: AdminUserQuery) -> Result<Page<UserInfo>, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db_pool)
            .await?;
        let page = PageRequest::new(query.page, self.config.accounts.admin_page_size).resolve(total.max(0) as u64);

        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            USER_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.db_pool)
        .await?;

        Ok(page.into_page(rows.into_iter().map(UserInfo::from).collect()))
    }

    pub async fn edit_user(&self, admin_id: Uuid, user_id: Uuid, update: AdminUserUpdate) -> Result<UserInfo, AppError> {
        update.validate()?;
        let user = self.user_row(user_id).await?;

        let username = update
            .username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&user.username)
            .to_string();
        let email = match update.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() && !validator::validate_email(email) => {
                return Err(AppError::Validation("Enter a valid email address.".to_string()));
            }
            Some(email) => email.to_string(),
            None => user.email.clone(),
        };
        let first_name = update.first_name.unwrap_or_else(|| user.first_name.clone());
        let roles = match update.is_admin {
            Some(is_admin) => with_admin_role(parse_roles(&user.roles), is_admin),
            None => parse_roles(&user.roles),
        };

        if self.username_taken(&username, Some(user_id)).await? {
            return Err(AppError::Conflict("Username already taken.".to_string()));
        }
        if self.email_taken(&email, Some(user_id)).await? {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = $1, email = $2, first_name = $3, roles = $4, updated_at = NOW()
            WHERE user_id = $5
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&username)
        .bind(&email)
        .bind(first_name.trim())
        .bind(role_strings(&roles))
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(map_user_write_error)?;

        tracing::info!(user_id = %user_id, admin_id = %admin_id, "user updated by admin");
        Ok(row.into())
    }

    /// Deletes the account; owned profiles and sessions go with it.
    pub async fn delete_user(&self, admin_id: Uuid, user_id: Uuid) -> Result<String, AppError> {
        let username: Option<String> = sqlx::query_scalar("DELETE FROM users WHERE user_id = $1 RETURNING username")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;

        let username = username.ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;
        tracing::info!(user_id = %user_id, admin_id = %admin_id, "user deleted by admin");
        Ok(format!("Deleted user {}.", username))
    }

    // Helpers

    async fn user_row(&self, user_id: Uuid) -> Result<UserRow, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
    }

    async fn has_mentee_profile(&self, user_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM mentee_profiles WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(exists)
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool, AppError> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::UUID IS NULL OR user_id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(taken)
    }

    /// Empty addresses never collide.
    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool, AppError> {
        if email.is_empty() {
            return Ok(false);
        }
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND ($2::UUID IS NULL OR user_id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.db_pool)
        .await?;
        Ok(taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(password: &str, confirm: &str) -> SignupRequest {
        SignupRequest {
            name: "Mia".to_string(),
            username: "mia".to_string(),
            email: "mia@example.com".to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    fn change(old: &str, new: &str, confirm: &str) -> ChangePasswordRequest {
        ChangePasswordRequest {
            old_password: old.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn signup_checks_fields_in_order() {
        assert!(validate_signup(&signup("password123", "password123")).is_ok());

        let mut blank = signup("password123", "password123");
        blank.name = "  ".to_string();
        assert_eq!(validate_signup(&blank).unwrap_err().public_message(), "Please fill in all fields.");

        let mismatch = validate_signup(&signup("password123", "password124")).unwrap_err();
        assert_eq!(mismatch.public_message(), "Passwords do not match.");

        let short = validate_signup(&signup("short", "short")).unwrap_err();
        assert_eq!(short.public_message(), "Password must be at least 8 characters long.");
    }

    #[test]
    fn password_reset_rules() {
        let reset = |password: &str, confirm: &str| ResetPasswordRequest {
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        };
        assert!(validate_password_reset(&reset("new-password", "new-password")).is_ok());
        assert_eq!(
            validate_password_reset(&reset("", "new-password")).unwrap_err().public_message(),
            "Please fill in all fields."
        );
        assert_eq!(
            validate_password_reset(&reset("new-password", "new-passw0rd")).unwrap_err().public_message(),
            "Passwords do not match."
        );
        assert_eq!(
            validate_password_reset(&reset("tiny", "tiny")).unwrap_err().public_message(),
            "Password must be at least 8 characters long."
        );
    }

    #[test]
    fn password_change_rules() {
        assert!(validate_password_change(&change("old-password", "new-password", "new-password")).is_ok());

        let missing = validate_password_change(&change("", "new-password", "new-password")).unwrap_err();
        assert_eq!(missing.public_message(), "Please fill in all password fields.");

        let mismatch = validate_password_change(&change("old", "new-password", "new-passw0rd")).unwrap_err();
        assert_eq!(mismatch.public_message(), "New passwords do not match.");

        let short = validate_password_change(&change("old", "tiny", "tiny")).unwrap_err();
        assert_eq!(short.public_message(), "New password must be at least 8 characters long.");
        assert_eq!(short.status_code(), 400);
    }
}
