//! Password reset tokens and the email that carries them.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use mentorhub_database::{PasswordResetTokenRow, UserRow};
use mentorhub_mailer::EmailMessage;

pub const TOKEN_LENGTH: usize = 50;

/// 50 hex characters drawn from two v4 UUIDs.
pub fn generate_reset_token() -> String {
    let mut token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    token.truncate(TOKEN_LENGTH);
    token
}

/// Unused and younger than `ttl`.
pub fn token_is_usable(row: &PasswordResetTokenRow, now: DateTime<Utc>, ttl: Duration) -> bool {
    !row.used && now - row.created_at < ttl
}

pub fn reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password/{}/", base_url.trim_end_matches('/'), token)
}

pub fn reset_email(user: &UserRow, url: &str, ttl: Duration) -> EmailMessage {
    let name = if user.first_name.trim().is_empty() {
        &user.username
    } else {
        &user.first_name
    };
    let expiry = match ttl.num_minutes() {
        60 => "1 hour".to_string(),
        minutes => format!("{} minutes", minutes),
    };

    EmailMessage {
        to: user.email.clone(),
        subject: "Password Reset Request - MentorHub".to_string(),
        body: format!(
            "Hello {},\n\nYou requested a password reset for your MentorHub account.\n\n\
             Follow this link to reset your password:\n{}\n\n\
             This link will expire in {}.\n\n\
             If you did not request this password reset, please ignore this email.\n\n\
             Best regards,\nThe MentorHub Team",
            name, url, expiry
        ),
    }
}
