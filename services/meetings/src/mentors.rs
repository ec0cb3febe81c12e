use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use mentorhub_common::{AppError, Page, PageRequest};

use crate::booking::MENTOR_NOT_FOUND;
use crate::config::BookingConfig;
use crate::models::{
    non_blank, AdminMentorQuery, AdminMentorRequest, ApplicationStatus, Availability,
    DashboardCounts, DirectoryQuery, MentorApplicationRequest, MentorFilter, MentorProfile,
    MentorProfileUpdate, MentorResponse, NewMentorProfile, SessionDuration, Skill, SkillRequest,
};
use crate::store::MentorRepository;

pub const NO_MENTOR_PROFILE: &str = "You don't have a mentor profile. Please contact an admin.";
pub const SKILL_NOT_FOUND: &str = "Skill not found";
const MAX_SKILL_NAME: usize = 35;

fn validate_rate(rate: Decimal) -> Result<Decimal, AppError> {
    let min = Decimal::new(1, 2);
    let max = Decimal::new(99_999_999, 2);
    if rate < min || rate > max {
        return Err(AppError::Validation(
            "Hourly rate must be between 0.01 and 999999.99.".to_string(),
        ));
    }
    Ok(rate.round_dp(2))
}

fn parse_duration(minutes: Option<i32>, current: SessionDuration) -> Result<SessionDuration, AppError> {
    match minutes {
        Some(minutes) => SessionDuration::try_from(minutes).map_err(AppError::Validation),
        None => Ok(current),
    }
}

fn checked_availability(availability: Availability) -> Result<Availability, AppError> {
    availability.validate().map_err(AppError::Validation)?;
    Ok(availability)
}

/// Splits comma-separated skill names, dropping blanks and repeats.
pub fn parse_skills_input(input: &str) -> Result<Vec<String>, AppError> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        if name.chars().count() > MAX_SKILL_NAME {
            return Err(AppError::Validation(format!(
                "Skill '{}' is longer than {} characters.",
                name, MAX_SKILL_NAME
            )));
        }
        if !names.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn parse_application_status(status: Option<String>) -> Result<Option<ApplicationStatus>, AppError> {
    match non_blank(status).as_deref() {
        None | Some("all") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::Validation(format!("Unknown application status '{}'.", value))),
    }
}

#[derive(Clone)]
pub struct MentorService {
    mentors: Arc<dyn MentorRepository>,
    config: BookingConfig,
}

impl MentorService {
    pub fn new(mentors: Arc<dyn MentorRepository>, config: BookingConfig) -> Self {
        Self { mentors, config }
    }

    // Public directory

    pub async fn directory(&self, query: DirectoryQuery) -> Result<Page<MentorResponse>, AppError> {
        let filter = MentorFilter::directory(query.search, query.skill);
        let page = self
            .mentors
            .search_mentors(&filter, PageRequest::new(query.page, self.config.directory_page_size))
            .await?;
        Ok(page.map(MentorResponse::from))
    }

    pub async fn public_mentor(&self, mentor_id: Uuid) -> Result<MentorResponse, AppError> {
        self.mentors
            .get_mentor(mentor_id)
            .await?
            .filter(MentorProfile::is_approved)
            .map(MentorResponse::from)
            .ok_or_else(|| AppError::NotFound(MENTOR_NOT_FOUND.to_string()))
    }

    pub async fn list_skills(&self) -> Result<Vec<Skill>, AppError> {
        Ok(self.mentors.list_skills().await?)
    }

    // Mentor self-service

    pub async fn apply(&self, user_id: Uuid, request: MentorApplicationRequest) -> Result<MentorResponse, AppError> {
        request.validate()?;

        if self.mentors.mentor_for_user(user_id).await?.is_some() {
            return Err(AppError::Conflict("You already have a mentor profile.".to_string()));
        }

        let skill_ids = match request.skills_input.as_deref() {
            Some(input) => self.resolve_skills(input).await?,
            None => Vec::new(),
        };

        let mentor = self
            .mentors
            .insert_mentor(NewMentorProfile {
                user_id: Some(user_id),
                full_name: request.full_name.trim().to_string(),
                headline: request.headline.trim().to_string(),
                bio: request.bio,
                location: non_blank(request.location),
                linkedin_url: non_blank(request.linkedin_url),
                github_url: non_blank(request.github_url),
                years_of_experience: request.years_of_experience,
                hourly_rate: validate_rate(request.hourly_rate)?,
                availability: checked_availability(request.availability)?,
                session_duration: parse_duration(request.session_duration, SessionDuration::default())?,
                available_for: request.available_for,
                application_status: ApplicationStatus::Pending,
                skill_ids,
            })
            .await?;

        tracing::info!(mentor_id = %mentor.id, user_id = %user_id, "mentor application submitted");
        Ok(mentor.into())
    }

    pub async fn own_profile(&self, user_id: Uuid) -> Result<MentorResponse, AppError> {
        Ok(self.mentor_for_actor(user_id).await?.into())
    }

    pub async fn edit_own_profile(&self, user_id: Uuid, update: MentorProfileUpdate) -> Result<MentorResponse, AppError> {
        update.validate()?;
        let mut mentor = self.mentor_for_actor(user_id).await?;

        if let Some(full_name) = update.full_name {
            mentor.full_name = full_name.trim().to_string();
        }
        if let Some(headline) = update.headline {
            mentor.headline = headline.trim().to_string();
        }
        if let Some(bio) = update.bio {
            mentor.bio = bio;
        }
        if update.location.is_some() {
            mentor.location = non_blank(update.location);
        }
        if update.linkedin_url.is_some() {
            mentor.linkedin_url = non_blank(update.linkedin_url);
        }
        if update.github_url.is_some() {
            mentor.github_url = non_blank(update.github_url);
        }
        if let Some(years) = update.years_of_experience {
            mentor.years_of_experience = years;
        }
        if let Some(rate) = update.hourly_rate {
            mentor.hourly_rate = validate_rate(rate)?;
        }
        mentor.session_duration = parse_duration(update.session_duration, mentor.session_duration)?;
        if let Some(available_for) = update.available_for {
            mentor.available_for = available_for;
        }
        if let Some(availability) = update.availability {
            mentor.availability = checked_availability(availability)?;
        }

        if let Some(input) = update.skills_input.as_deref() {
            let skill_ids = self.resolve_skills(input).await?;
            self.mentors.set_mentor_skills(mentor.id, &skill_ids).await?;
        }
        let mentor = self.mentors.update_mentor(&mentor).await?;

        tracing::info!(mentor_id = %mentor.id, "mentor profile updated by owner");
        Ok(mentor.into())
    }

    // Administration

    pub async fn admin_list(&self, query: AdminMentorQuery) -> Result<Page<MentorResponse>, AppError> {
        let filter = MentorFilter::admin(parse_application_status(query.status)?, query.q);
        let page = self
            .mentors
            .search_mentors(&filter, PageRequest::new(query.page, self.config.admin_page_size))
            .await?;
        Ok(page.map(MentorResponse::from))
    }

    /// Mentors created by an administrator start out approved.
    pub async fn admin_add(&self, request: AdminMentorRequest) -> Result<MentorResponse, AppError> {
        request.validate()?;

        let full_name = non_blank(request.full_name)
            .ok_or_else(|| AppError::Validation("Full name is required.".to_string()))?;
        let headline = non_blank(request.headline)
            .ok_or_else(|| AppError::Validation("Headline is required.".to_string()))?;
        let hourly_rate = request
            .hourly_rate
            .ok_or_else(|| AppError::Validation("Hourly rate is required.".to_string()))?;

        let mentor = self
            .mentors
            .insert_mentor(NewMentorProfile {
                user_id: request.user_id,
                full_name,
                headline,
                bio: request.bio.unwrap_or_default(),
                location: non_blank(request.location),
                linkedin_url: non_blank(request.linkedin_url),
                github_url: non_blank(request.github_url),
                years_of_experience: request.years_of_experience.unwrap_or(0),
                hourly_rate: validate_rate(hourly_rate)?,
                availability: checked_availability(request.availability.unwrap_or_default())?,
                session_duration: parse_duration(request.session_duration, SessionDuration::default())?,
                available_for: request.available_for.unwrap_or_default(),
                application_status: ApplicationStatus::Approved,
                skill_ids: request.skill_ids.unwrap_or_default(),
            })
            .await?;

        tracing::info!(mentor_id = %mentor.id, "mentor added by admin");
        Ok(mentor.into())
    }

    pub async fn admin_edit(&self, mentor_id: Uuid, request: AdminMentorRequest) -> Result<MentorResponse, AppError> {
        request.validate()?;
        let mut mentor = self.mentor(mentor_id).await?;

        if let Some(full_name) = non_blank(request.full_name) {
            mentor.full_name = full_name;
        }
        if let Some(headline) = non_blank(request.headline) {
            mentor.headline = headline;
        }
        if let Some(bio) = request.bio {
            mentor.bio = bio;
        }
        if request.location.is_some() {
            mentor.location = non_blank(request.location);
        }
        if request.linkedin_url.is_some() {
            mentor.linkedin_url = non_blank(request.linkedin_url);
        }
        if request.github_url.is_some() {
            mentor.github_url = non_blank(request.github_url);
        }
        if let Some(years) = request.years_of_experience {
            mentor.years_of_experience = years;
        }
        if let Some(rate) = request.hourly_rate {
            mentor.hourly_rate = validate_rate(rate)?;
        }
        mentor.session_duration = parse_duration(request.session_duration, mentor.session_duration)?;
        if let Some(available_for) = request.available_for {
            mentor.available_for = available_for;
        }
        if let Some(availability) = request.availability {
            mentor.availability = checked_availability(availability)?;
        }
        if request.admin_notes.is_some() {
            mentor.admin_notes = non_blank(request.admin_notes);
        }

        if let Some(skill_ids) = &request.skill_ids {
            self.mentors.set_mentor_skills(mentor.id, skill_ids).await?;
        }
        let mentor = self.mentors.update_mentor(&mentor).await?;

        tracing::info!(mentor_id = %mentor.id, "mentor edited by admin");
        Ok(mentor.into())
    }

    pub async fn approve(&self, mentor_id: Uuid) -> Result<MentorResponse, AppError> {
        self.set_application_status(mentor_id, ApplicationStatus::Approved).await
    }

    pub async fn reject(&self, mentor_id: Uuid) -> Result<MentorResponse, AppError> {
        self.set_application_status(mentor_id, ApplicationStatus::Rejected).await
    }

    /// Removes the mentor together with its sessions.
    pub async fn delete(&self, mentor_id: Uuid) -> Result<(), AppError> {
        if !self.mentors.delete_mentor(mentor_id).await? {
            return Err(AppError::NotFound(MENTOR_NOT_FOUND.to_string()));
        }
        tracing::info!(mentor_id = %mentor_id, "mentor deleted by admin");
        Ok(())
    }

    pub async fn add_skill(&self, request: SkillRequest) -> Result<Skill, AppError> {
        request.validate()?;
        let mut skill = self.mentors.get_or_create_skill(request.name.trim()).await?;

        if let Some(description) = non_blank(request.description) {
            skill.description = description;
            skill = self.mentors.update_skill(&skill).await?;
        }
        Ok(skill)
    }

    pub async fn edit_skill(&self, skill_id: Uuid, request: SkillRequest) -> Result<Skill, AppError> {
        request.validate()?;
        let mut skill = self
            .mentors
            .get_skill(skill_id)
            .await?
            .ok_or_else(|| AppError::NotFound(SKILL_NOT_FOUND.to_string()))?;

        skill.name = request.name.trim().to_string();
        if let Some(description) = request.description {
            skill.description = description.trim().to_string();
        }
        Ok(self.mentors.update_skill(&skill).await?)
    }

    pub async fn delete_skill(&self, skill_id: Uuid) -> Result<(), AppError> {
        if !self.mentors.delete_skill(skill_id).await? {
            return Err(AppError::NotFound(SKILL_NOT_FOUND.to_string()));
        }
        Ok(())
    }

    pub async fn dashboard_counts(&self) -> Result<DashboardCounts, AppError> {
        Ok(self.mentors.dashboard_counts().await?)
    }

    async fn set_application_status(&self, mentor_id: Uuid, status: ApplicationStatus) -> Result<MentorResponse, AppError> {
        let mut mentor = self.mentor(mentor_id).await?;
        mentor.application_status = status;
        let mentor = self.mentors.update_mentor(&mentor).await?;

        tracing::info!(mentor_id = %mentor.id, status = status.as_str(), "mentor application status changed");
        Ok(mentor.into())
    }

    async fn mentor(&self, mentor_id: Uuid) -> Result<MentorProfile, AppError> {
        self.mentors
            .get_mentor(mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(MENTOR_NOT_FOUND.to_string()))
    }

    async fn mentor_for_actor(&self, user_id: Uuid) -> Result<MentorProfile, AppError> {
        self.mentors
            .mentor_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::Authorization(NO_MENTOR_PROFILE.to_string()))
    }

    async fn resolve_skills(&self, input: &str) -> Result<Vec<Uuid>, AppError> {
        let mut ids = Vec::new();
        for name in parse_skills_input(input)? {
            ids.push(self.mentors.get_or_create_skill(&name).await?.id);
        }
        Ok(ids)
    }
}
