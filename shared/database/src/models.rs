use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

// Row shapes as stored. Enum-valued columns stay strings here and are
// parsed by the owning service.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub roles: Vec<String>, // PostgreSQL text array
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PasswordResetTokenRow {
    pub user_id: Uuid,
    pub token: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillRow {
    pub skill_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MentorProfileRow {
    pub mentor_id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub years_of_experience: i32,
    pub hourly_rate: Decimal,
    pub availability: serde_json::Value,
    pub session_duration: i32,
    pub available_for: String,
    pub application_status: String,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenteeProfileRow {
    pub user_id: Uuid,
    pub full_name: String,
    pub interests: String,
    pub current_level: String,
    pub goal: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: String,
    pub meeting_link: Option<String>,
    pub meeting_notes: Option<String>,
    pub admin_provided_link: Option<String>,
    pub link_provided_at: Option<DateTime<Utc>>,
    pub amount_paid: Decimal,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
