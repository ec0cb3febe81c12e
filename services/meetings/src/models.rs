use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use mentorhub_database::{MentorProfileRow, SessionRow, SkillRow};

use crate::store::StoreError;

// Session Status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Confirmed => "confirmed",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "Pending",
            SessionStatus::Confirmed => "Confirmed",
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
        }
    }

    /// Active sessions hold their slot.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionStatus::Pending | SessionStatus::Confirmed)
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "confirmed" => Ok(SessionStatus::Confirmed),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Single source of truth for mentor approval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("unknown application status: {}", other)),
        }
    }
}

/// Default session lengths a mentor may advertise.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "i32", into = "i32")]
pub enum SessionDuration {
    HalfHour,
    ThreeQuarters,
    #[default]
    Hour,
    HourAndHalf,
    TwoHours,
}

impl SessionDuration {
    pub fn minutes(&self) -> i32 {
        match self {
            SessionDuration::HalfHour => 30,
            SessionDuration::ThreeQuarters => 45,
            SessionDuration::Hour => 60,
            SessionDuration::HourAndHalf => 90,
            SessionDuration::TwoHours => 120,
        }
    }
}

impl TryFrom<i32> for SessionDuration {
    type Error = String;

    fn try_from(minutes: i32) -> Result<Self, Self::Error> {
        match minutes {
            30 => Ok(SessionDuration::HalfHour),
            45 => Ok(SessionDuration::ThreeQuarters),
            60 => Ok(SessionDuration::Hour),
            90 => Ok(SessionDuration::HourAndHalf),
            120 => Ok(SessionDuration::TwoHours),
            other => Err(format!(
                "Session duration must be one of 30, 45, 60, 90 or 120 minutes, got {}.",
                other
            )),
        }
    }
}

impl From<SessionDuration> for i32 {
    fn from(duration: SessionDuration) -> Self {
        duration.minutes()
    }
}

/// Weekly availability: weekday key (`mon`..`sun`) to advertised `HH:MM` start times.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Availability(pub BTreeMap<String, Vec<String>>);

pub const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

pub fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

impl Availability {
    pub fn validate(&self) -> Result<(), String> {
        for (day, times) in &self.0 {
            if !WEEKDAY_KEYS.contains(&day.as_str()) {
                return Err(format!("Unknown weekday '{}' in availability. Use mon..sun.", day));
            }
            for time in times {
                if NaiveTime::parse_from_str(time, "%H:%M").is_err() {
                    return Err(format!("Invalid time '{}' for {}. Use HH:MM.", time, day));
                }
            }
        }
        Ok(())
    }

    /// Advertised start times for the weekday of `date`, sorted, unparsable entries skipped.
    pub fn times_on(&self, date: NaiveDate) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = self
            .0
            .get(weekday_key(date.weekday()))
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| NaiveTime::parse_from_str(entry, "%H:%M").ok())
                    .collect()
            })
            .unwrap_or_default();
        times.sort();
        times.dedup();
        times
    }

    fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_else(|_| serde_json::json!({}))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<SkillRow> for Skill {
    fn from(row: SkillRow) -> Self {
        Self {
            id: row.skill_id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentorProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub years_of_experience: i32,
    pub hourly_rate: Decimal,
    pub availability: Availability,
    pub session_duration: SessionDuration,
    pub available_for: String,
    pub application_status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub skills: Vec<Skill>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MentorProfile {
    pub fn is_approved(&self) -> bool {
        self.application_status == ApplicationStatus::Approved
    }

    pub fn from_row(row: MentorProfileRow, skills: Vec<Skill>) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.mentor_id,
            user_id: row.user_id,
            full_name: row.full_name,
            headline: row.headline,
            bio: row.bio,
            location: row.location,
            linkedin_url: row.linkedin_url,
            github_url: row.github_url,
            years_of_experience: row.years_of_experience,
            hourly_rate: row.hourly_rate,
            availability: Availability::from_json(row.availability),
            session_duration: SessionDuration::try_from(row.session_duration).map_err(StoreError::Corrupt)?,
            available_for: row.available_for,
            application_status: row.application_status.parse().map_err(StoreError::Corrupt)?,
            admin_notes: row.admin_notes,
            skills,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Public shape of a mentor profile; approval is a derived read.
#[derive(Debug, Clone, Serialize)]
pub struct MentorResponse {
    #[serde(flatten)]
    pub profile: MentorProfile,
    pub is_approved: bool,
}

impl From<MentorProfile> for MentorResponse {
    fn from(profile: MentorProfile) -> Self {
        Self {
            is_approved: profile.is_approved(),
            profile,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub amount_paid: Decimal,
    pub meeting_link: Option<String>,
    pub meeting_notes: Option<String>,
    pub admin_provided_link: Option<String>,
    pub link_provided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Admin override first, then the generated link, else empty.
    pub fn effective_meeting_link(&self) -> &str {
        [&self.admin_provided_link, &self.meeting_link]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|link| !link.is_empty())
            .unwrap_or("")
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.session_date.and_time(self.session_time)
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.session_id,
            mentor_id: row.mentor_id,
            mentee_id: row.mentee_id,
            session_date: row.session_date,
            session_time: row.session_time,
            duration_minutes: row.duration_minutes,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            payment_status: row.payment_status.parse().map_err(StoreError::Corrupt)?,
            amount_paid: row.amount_paid,
            meeting_link: row.meeting_link,
            meeting_notes: row.meeting_notes,
            admin_provided_link: row.admin_provided_link,
            link_provided_at: row.link_provided_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub effective_meeting_link: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            effective_meeting_link: session.effective_meeting_link().to_string(),
            session,
        }
    }
}

/// Everything needed to create a session row.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub mentor_id: Uuid,
    pub mentee_id: Uuid,
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: i32,
    pub amount_paid: Decimal,
    pub meeting_notes: Option<String>,
}

/// A status change that only applies while the stored status still equals
/// `from`. Link and note fields are written when set and left alone otherwise;
/// payment status is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTransition {
    pub session_id: Uuid,
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub meeting_link: Option<String>,
    pub meeting_notes: Option<String>,
    pub admin_provided_link: Option<String>,
    pub link_provided_at: Option<DateTime<Utc>>,
}

impl SessionTransition {
    pub fn new(session: &Session, to: SessionStatus) -> Self {
        Self {
            session_id: session.id,
            from: session.status,
            to,
            meeting_link: None,
            meeting_notes: None,
            admin_provided_link: None,
            link_provided_at: None,
        }
    }

    /// Carries the link and note fields that `edited` changed relative to `read`.
    pub fn with_changes(mut self, read: &Session, edited: &Session) -> Self {
        if edited.meeting_link != read.meeting_link {
            self.meeting_link = edited.meeting_link.clone();
        }
        if edited.meeting_notes != read.meeting_notes {
            self.meeting_notes = edited.meeting_notes.clone();
        }
        if edited.admin_provided_link != read.admin_provided_link {
            self.admin_provided_link = edited.admin_provided_link.clone();
            self.link_provided_at = edited.link_provided_at;
        }
        self
    }

    pub fn apply(&self, session: &mut Session) {
        session.status = self.to;
        if let Some(link) = &self.meeting_link {
            session.meeting_link = Some(link.clone());
        }
        if let Some(notes) = &self.meeting_notes {
            session.meeting_notes = Some(notes.clone());
        }
        if let Some(link) = &self.admin_provided_link {
            session.admin_provided_link = Some(link.clone());
            session.link_provided_at = self.link_provided_at;
        }
    }
}

/// Login identity as seen by this service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContact {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
}

impl UserContact {
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            &self.username
        } else {
            &self.first_name
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSessionSummary {
    #[serde(flatten)]
    pub session: SessionResponse,
    pub mentor_name: String,
    pub mentee: UserContact,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentorSearchScope {
    /// Name, headline, bio and skill names.
    Directory,
    /// Name, headline and linked username.
    Admin,
}

#[derive(Debug, Clone)]
pub struct MentorFilter {
    pub status: Option<ApplicationStatus>,
    pub search: Option<String>,
    pub skill: Option<String>,
    pub scope: MentorSearchScope,
}

impl MentorFilter {
    pub fn directory(search: Option<String>, skill: Option<String>) -> Self {
        Self {
            status: Some(ApplicationStatus::Approved),
            search: non_blank(search),
            skill: non_blank(skill),
            scope: MentorSearchScope::Directory,
        }
    }

    pub fn admin(status: Option<ApplicationStatus>, search: Option<String>) -> Self {
        Self {
            status,
            search: non_blank(search),
            skill: None,
            scope: MentorSearchScope::Admin,
        }
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fields of a mentor profile as written by its owner or an administrator.
#[derive(Debug, Clone)]
pub struct NewMentorProfile {
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub headline: String,
    pub bio: String,
    pub location: Option<String>,
    pub linkedin_url: Option<String>,
    pub github_url: Option<String>,
    pub years_of_experience: i32,
    pub hourly_rate: Decimal,
    pub availability: Availability,
    pub session_duration: SessionDuration,
    pub available_for: String,
    pub application_status: ApplicationStatus,
    pub skill_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardCounts {
    pub total_users: i64,
    pub total_mentors: i64,
    pub pending_mentors: i64,
    pub approved_mentors: i64,
    pub total_skills: i64,
}

// Request DTOs

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookSessionRequest {
    pub session_date: NaiveDate,
    pub session_time: NaiveTime,
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters."))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub action: String,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityResponse {
    pub mentor_id: Uuid,
    pub date: NaiveDate,
    pub weekday: &'static str,
    pub advertised: Vec<NaiveTime>,
    pub available: Vec<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub skill: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminMentorQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSessionQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

/// Mentor application submitted by a signed-in user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MentorApplicationRequest {
    #[validate(length(min = 1, max = 100, message = "Full name is required (at most 100 characters)."))]
    pub full_name: String,
    #[validate(length(min = 1, max = 100, message = "Headline is required (at most 100 characters)."))]
    pub headline: String,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    #[serde(default)]
    pub bio: String,
    #[validate(length(max = 100, message = "Location must be at most 100 characters."))]
    pub location: Option<String>,
    #[validate(url(message = "Enter a valid LinkedIn URL."))]
    pub linkedin_url: Option<String>,
    #[validate(url(message = "Enter a valid GitHub URL."))]
    pub github_url: Option<String>,
    #[validate(range(min = 0, max = 50, message = "Years of experience must be between 0 and 50."))]
    pub years_of_experience: i32,
    pub hourly_rate: Decimal,
    pub session_duration: Option<i32>,
    #[serde(default)]
    pub available_for: String,
    #[serde(default)]
    pub availability: Availability,
    pub skills_input: Option<String>,
}

/// Partial update of a mentor profile. `skills_input` is comma-separated and
/// replaces the skill set when present.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MentorProfileUpdate {
    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters."))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Headline must be 1 to 100 characters."))]
    pub headline: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: Option<String>,
    #[validate(length(max = 100, message = "Location must be at most 100 characters."))]
    pub location: Option<String>,
    #[validate(url(message = "Enter a valid LinkedIn URL."))]
    pub linkedin_url: Option<String>,
    #[validate(url(message = "Enter a valid GitHub URL."))]
    pub github_url: Option<String>,
    #[validate(range(min = 0, max = 50, message = "Years of experience must be between 0 and 50."))]
    pub years_of_experience: Option<i32>,
    pub hourly_rate: Option<Decimal>,
    pub session_duration: Option<i32>,
    pub available_for: Option<String>,
    pub availability: Option<Availability>,
    pub skills_input: Option<String>,
}

/// Administrative create/edit of a mentor. Skills are given by id.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AdminMentorRequest {
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100, message = "Full name must be 1 to 100 characters."))]
    pub full_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Headline must be 1 to 100 characters."))]
    pub headline: Option<String>,
    #[validate(length(max = 500, message = "Bio must be at most 500 characters."))]
    pub bio: Option<String>,
    #[validate(length(max = 100, message = "Location must be at most 100 characters."))]
    pub location: Option<String>,
    #[validate(url(message = "Enter a valid LinkedIn URL."))]
    pub linkedin_url: Option<String>,
    #[validate(url(message = "Enter a valid GitHub URL."))]
    pub github_url: Option<String>,
    #[validate(range(min = 0, max = 50, message = "Years of experience must be between 0 and 50."))]
    pub years_of_experience: Option<i32>,
    pub hourly_rate: Option<Decimal>,
    pub session_duration: Option<i32>,
    pub available_for: Option<String>,
    pub availability: Option<Availability>,
    pub admin_notes: Option<String>,
    pub skill_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SkillRequest {
    #[validate(length(min = 1, max = 35, message = "Skill name must be 1 to 35 characters."))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MenteeDashboard {
    pub upcoming_sessions: Vec<SessionResponse>,
    pub past_sessions: Vec<SessionResponse>,
    pub cancelled_sessions: Vec<SessionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentorDashboard {
    pub mentor: MentorResponse,
    pub upcoming_sessions: Vec<SessionResponse>,
    pub past_sessions: Vec<SessionResponse>,
}
