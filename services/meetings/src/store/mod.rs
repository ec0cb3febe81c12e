//! Storage seams for the meetings service.
//!
//! Handlers and services only see the two repository traits; `PgStore` backs
//! them in production and `MemoryStore` in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use mentorhub_common::{AppError, Page, PageRequest};

use crate::models::{
    AdminSessionSummary, DashboardCounts, MentorFilter, MentorProfile, NewMentorProfile,
    NewSession, Session, SessionFilter, SessionTransition, Skill, UserContact,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const SLOT_TAKEN_MESSAGE: &str = "This time slot is already booked. Please choose another time.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("time slot already booked")]
    SlotTaken,

    #[error("{0}")]
    Duplicate(String),

    #[error("record not found")]
    NotFound,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::SlotTaken => AppError::Conflict(SLOT_TAKEN_MESSAGE.to_string()),
            StoreError::Duplicate(message) => AppError::Conflict(message),
            StoreError::NotFound => AppError::NotFound("Record not found".to_string()),
            StoreError::Corrupt(message) => AppError::Internal(message),
            StoreError::Database(error) => AppError::Database(error),
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a session. A second session for the same mentor, date and
    /// time fails with [`StoreError::SlotTaken`].
    async fn insert_session(&self, new: NewSession) -> Result<Session, StoreError>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Applies the transition if the stored status still equals `from`.
    /// `None` when the session is gone or its status moved on.
    async fn transition_session(&self, change: &SessionTransition) -> Result<Option<Session>, StoreError>;

    /// Marks a pending payment completed, leaving the session status alone.
    /// `None` when the session is gone or already paid.
    async fn complete_payment(&self, session_id: Uuid) -> Result<Option<Session>, StoreError>;

    /// True when an active session already holds the slot.
    async fn slot_taken(&self, mentor_id: Uuid, date: NaiveDate, time: NaiveTime) -> Result<bool, StoreError>;

    /// Start times held by active sessions of the mentor on `date`.
    async fn booked_times(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<NaiveTime>, StoreError>;

    /// Sessions booked by the mentee, ordered by date and time.
    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> Result<Vec<Session>, StoreError>;

    /// Sessions of the mentor, ordered by date and time.
    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<Session>, StoreError>;

    /// Newest first, filtered by status and a search over mentor name and
    /// mentee username, email and first name.
    async fn search_sessions(
        &self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> Result<Page<AdminSessionSummary>, StoreError>;

    async fn user_contact(&self, user_id: Uuid) -> Result<Option<UserContact>, StoreError>;
}

#[async_trait]
pub trait MentorRepository: Send + Sync {
    async fn get_mentor(&self, mentor_id: Uuid) -> Result<Option<MentorProfile>, StoreError>;

    async fn mentor_for_user(&self, user_id: Uuid) -> Result<Option<MentorProfile>, StoreError>;

    /// Newest first.
    async fn search_mentors(
        &self,
        filter: &MentorFilter,
        page: PageRequest,
    ) -> Result<Page<MentorProfile>, StoreError>;

    async fn insert_mentor(&self, new: NewMentorProfile) -> Result<MentorProfile, StoreError>;

    /// Persists profile fields and application status. Skills are set separately.
    async fn update_mentor(&self, mentor: &MentorProfile) -> Result<MentorProfile, StoreError>;

    async fn set_mentor_skills(&self, mentor_id: Uuid, skill_ids: &[Uuid]) -> Result<(), StoreError>;

    /// Deletes the profile with its sessions and skill links.
    async fn delete_mentor(&self, mentor_id: Uuid) -> Result<bool, StoreError>;

    /// Ordered by name.
    async fn list_skills(&self) -> Result<Vec<Skill>, StoreError>;

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError>;

    async fn get_or_create_skill(&self, name: &str) -> Result<Skill, StoreError>;

    async fn update_skill(&self, skill: &Skill) -> Result<Skill, StoreError>;

    async fn delete_skill(&self, skill_id: Uuid) -> Result<bool, StoreError>;

    async fn dashboard_counts(&self) -> Result<DashboardCounts, StoreError>;
}
