use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use mentorhub_common::{Page, PageRequest};

use crate::models::{
    AdminSessionSummary, ApplicationStatus, DashboardCounts, MentorFilter, MentorProfile,
    MentorSearchScope, NewMentorProfile, NewSession, PaymentStatus, Session, SessionFilter,
    SessionStatus, SessionTransition, Skill, UserContact,
};

use super::{MentorRepository, SessionRepository, StoreError};

/// In-process store with the same uniqueness and cascade rules as the schema.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, (UserContact, DateTime<Utc>)>,
    mentors: HashMap<Uuid, MentorProfile>,
    mentor_skills: HashMap<Uuid, Vec<Uuid>>,
    skills: HashMap<Uuid, Skill>,
    sessions: HashMap<Uuid, Session>,
}

impl MemoryState {
    fn resolve(&self, mentor: &MentorProfile) -> MentorProfile {
        let mut skills: Vec<Skill> = self
            .mentor_skills
            .get(&mentor.id)
            .map(|ids| ids.iter().filter_map(|id| self.skills.get(id).cloned()).collect())
            .unwrap_or_default();
        skills.sort_by(|a, b| a.name.cmp(&b.name));

        MentorProfile {
            skills,
            ..mentor.clone()
        }
    }

    fn linked_username(&self, mentor: &MentorProfile) -> Option<&str> {
        mentor
            .user_id
            .and_then(|id| self.users.get(&id))
            .map(|(contact, _)| contact.username.as_str())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a login identity, standing in for the user-management service.
    pub async fn add_user(&self, username: &str, email: &str, first_name: &str) -> UserContact {
        let contact = UserContact {
            user_id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            first_name: first_name.to_string(),
        };
        self.state
            .write()
            .await
            .users
            .insert(contact.user_id, (contact.clone(), Utc::now()));
        contact
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn insert_session(&self, new: NewSession) -> Result<Session, StoreError> {
        let mut state = self.state.write().await;

        let taken = state.sessions.values().any(|s| {
            s.mentor_id == new.mentor_id
                && s.session_date == new.session_date
                && s.session_time == new.session_time
        });
        if taken {
            return Err(StoreError::SlotTaken);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            mentor_id: new.mentor_id,
            mentee_id: new.mentee_id,
            session_date: new.session_date,
            session_time: new.session_time,
            duration_minutes: new.duration_minutes,
            status: SessionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            amount_paid: new.amount_paid,
            meeting_link: None,
            meeting_notes: new.meeting_notes,
            admin_provided_link: None,
            link_provided_at: None,
            created_at: now,
            updated_at: now,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.state.read().await.sessions.get(&session_id).cloned())
    }

    async fn transition_session(&self, change: &SessionTransition) -> Result<Option<Session>, StoreError> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .sessions
            .get_mut(&change.session_id)
            .filter(|s| s.status == change.from)
        else {
            return Ok(None);
        };

        change.apply(stored);
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn complete_payment(&self, session_id: Uuid) -> Result<Option<Session>, StoreError> {
        let mut state = self.state.write().await;
        let Some(stored) = state
            .sessions
            .get_mut(&session_id)
            .filter(|s| s.payment_status == PaymentStatus::Pending)
        else {
            return Ok(None);
        };

        stored.payment_status = PaymentStatus::Completed;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn slot_taken(&self, mentor_id: Uuid, date: NaiveDate, time: NaiveTime) -> Result<bool, StoreError> {
        Ok(self.state.read().await.sessions.values().any(|s| {
            s.mentor_id == mentor_id && s.session_date == date && s.session_time == time && s.status.is_active()
        }))
    }

    async fn booked_times(&self, mentor_id: Uuid, date: NaiveDate) -> Result<Vec<NaiveTime>, StoreError> {
        let state = self.state.read().await;
        let mut times: Vec<NaiveTime> = state
            .sessions
            .values()
            .filter(|s| s.mentor_id == mentor_id && s.session_date == date && s.status.is_active())
            .map(|s| s.session_time)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn sessions_for_mentee(&self, mentee_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.mentee_id == mentee_id)
            .cloned()
            .collect();
        sessions.sort_by_key(Session::starts_at);
        Ok(sessions)
    }

    async fn sessions_for_mentor(&self, mentor_id: Uuid) -> Result<Vec<Session>, StoreError> {
        let state = self.state.read().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.mentor_id == mentor_id)
            .cloned()
            .collect();
        sessions.sort_by_key(Session::starts_at);
        Ok(sessions)
    }

    async fn search_sessions(
        &self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> Result<Page<AdminSessionSummary>, StoreError> {
        let state = self.state.read().await;

        let mut matches: Vec<AdminSessionSummary> = state
            .sessions
            .values()
            .filter(|s| filter.status.map_or(true, |status| s.status == status))
            .filter_map(|s| {
                let mentor = state.mentors.get(&s.mentor_id)?;
                let (mentee, _) = state.users.get(&s.mentee_id)?;
                Some(AdminSessionSummary {
                    session: s.clone().into(),
                    mentor_name: mentor.full_name.clone(),
                    mentee: mentee.clone(),
                })
            })
            .filter(|summary| match &filter.search {
                Some(text) => {
                    contains_ci(&summary.mentor_name, text)
                        || contains_ci(&summary.mentee.username, text)
                        || contains_ci(&summary.mentee.email, text)
                        || contains_ci(&summary.mentee.first_name, text)
                }
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| b.session.session.starts_at().cmp(&a.session.session.starts_at()));

        let resolved = page.resolve(matches.len() as u64);
        Ok(resolved.slice(matches))
    }

    async fn user_contact(&self, user_id: Uuid) -> Result<Option<UserContact>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .get(&user_id)
            .map(|(contact, _)| contact.clone()))
    }
}

#[async_trait]
impl MentorRepository for MemoryStore {
    async fn get_mentor(&self, mentor_id: Uuid) -> Result<Option<MentorProfile>, StoreError> {
        let state = self.state.read().await;
        Ok(state.mentors.get(&mentor_id).map(|m| state.resolve(m)))
    }

    async fn mentor_for_user(&self, user_id: Uuid) -> Result<Option<MentorProfile>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .mentors
            .values()
            .find(|m| m.user_id == Some(user_id))
            .map(|m| state.resolve(m)))
    }

    async fn search_mentors(
        &self,
        filter: &MentorFilter,
        page: PageRequest,
    ) -> Result<Page<MentorProfile>, StoreError> {
        let state = self.state.read().await;

        let mut matches: Vec<MentorProfile> = state
            .mentors
            .values()
            .filter(|m| filter.status.map_or(true, |status| m.application_status == status))
            .map(|m| state.resolve(m))
            .filter(|m| match &filter.search {
                Some(text) => {
                    contains_ci(&m.full_name, text)
                        || contains_ci(&m.headline, text)
                        || match filter.scope {
                            MentorSearchScope::Directory => {
                                contains_ci(&m.bio, text)
                                    || m.skills.iter().any(|skill| contains_ci(&skill.name, text))
                            }
                            MentorSearchScope::Admin => state
                                .linked_username(m)
                                .is_some_and(|username| contains_ci(username, text)),
                        }
                }
                None => true,
            })
            .filter(|m| match &filter.skill {
                Some(skill) => m.skills.iter().any(|s| contains_ci(&s.name, skill)),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let resolved = page.resolve(matches.len() as u64);
        Ok(resolved.slice(matches))
    }

    async fn insert_mentor(&self, new: NewMentorProfile) -> Result<MentorProfile, StoreError> {
        let mut state = self.state.write().await;

        if let Some(user_id) = new.user_id {
            if state.mentors.values().any(|m| m.user_id == Some(user_id)) {
                return Err(StoreError::Duplicate("This user already has a mentor profile.".to_string()));
            }
        }

        let now = Utc::now();
        let mentor = MentorProfile {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            full_name: new.full_name,
            headline: new.headline,
            bio: new.bio,
            location: new.location,
            linkedin_url: new.linkedin_url,
            github_url: new.github_url,
            years_of_experience: new.years_of_experience,
            hourly_rate: new.hourly_rate,
            availability: new.availability,
            session_duration: new.session_duration,
            available_for: new.available_for,
            application_status: new.application_status,
            admin_notes: None,
            skills: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let skill_ids: Vec<Uuid> = new
            .skill_ids
            .into_iter()
            .filter(|id| state.skills.contains_key(id))
            .collect();
        state.mentor_skills.insert(mentor.id, skill_ids);
        state.mentors.insert(mentor.id, mentor.clone());

        Ok(state.resolve(&mentor))
    }

    async fn update_mentor(&self, mentor: &MentorProfile) -> Result<MentorProfile, StoreError> {
        let mut state = self.state.write().await;
        let stored = state.mentors.get_mut(&mentor.id).ok_or(StoreError::NotFound)?;

        *stored = MentorProfile {
            id: stored.id,
            user_id: stored.user_id,
            created_at: stored.created_at,
            updated_at: Utc::now(),
            skills: Vec::new(),
            ..mentor.clone()
        };
        let updated = stored.clone();

        Ok(state.resolve(&updated))
    }

    async fn set_mentor_skills(&self, mentor_id: Uuid, skill_ids: &[Uuid]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut ids: Vec<Uuid> = skill_ids
            .iter()
            .copied()
            .filter(|id| state.skills.contains_key(id))
            .collect();
        ids.sort();
        ids.dedup();
        state.mentor_skills.insert(mentor_id, ids);
        Ok(())
    }

    async fn delete_mentor(&self, mentor_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.mentors.remove(&mentor_id).is_none() {
            return Ok(false);
        }
        state.mentor_skills.remove(&mentor_id);
        state.sessions.retain(|_, s| s.mentor_id != mentor_id);
        Ok(true)
    }

    async fn list_skills(&self) -> Result<Vec<Skill>, StoreError> {
        let mut skills: Vec<Skill> = self.state.read().await.skills.values().cloned().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(skills)
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError> {
        Ok(self.state.read().await.skills.get(&skill_id).cloned())
    }

    async fn get_or_create_skill(&self, name: &str) -> Result<Skill, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.skills.values().find(|s| s.name == name) {
            return Ok(existing.clone());
        }

        let skill = Skill {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            created_at: Utc::now(),
        };
        state.skills.insert(skill.id, skill.clone());
        Ok(skill)
    }

    async fn update_skill(&self, skill: &Skill) -> Result<Skill, StoreError> {
        let mut state = self.state.write().await;
        if state.skills.values().any(|s| s.id != skill.id && s.name == skill.name) {
            return Err(StoreError::Duplicate("A skill with this name already exists.".to_string()));
        }

        let stored = state.skills.get_mut(&skill.id).ok_or(StoreError::NotFound)?;
        stored.name = skill.name.clone();
        stored.description = skill.description.clone();
        Ok(stored.clone())
    }

    async fn delete_skill(&self, skill_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.skills.remove(&skill_id).is_none() {
            return Ok(false);
        }
        for ids in state.mentor_skills.values_mut() {
            ids.retain(|id| *id != skill_id);
        }
        Ok(true)
    }

    async fn dashboard_counts(&self) -> Result<DashboardCounts, StoreError> {
        let state = self.state.read().await;
        let with_status = |status: ApplicationStatus| {
            state
                .mentors
                .values()
                .filter(|m| m.application_status == status)
                .count() as i64
        };

        Ok(DashboardCounts {
            total_users: state.users.len() as i64,
            total_mentors: state.mentors.len() as i64,
            pending_mentors: with_status(ApplicationStatus::Pending),
            approved_mentors: with_status(ApplicationStatus::Approved),
            total_skills: state.skills.len() as i64,
        })
    }
}
