//! Meeting links for confirmed sessions.
//!
//! A calendar provider is asked first; when it reports itself unavailable the
//! link is derived from a SHA-256 digest of the session's participants and
//! slot, so regenerating it for the same session yields the same URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use mentorhub_common::AppError;

use crate::config::CalendarConfig;
use crate::models::{MentorProfile, Session, UserContact};

#[derive(Debug, Error)]
pub enum CalendarError {
    /// The integration cannot serve this request; callers fall back.
    #[error("calendar unavailable: {0}")]
    Unavailable(String),

    /// The event we built is malformed.
    #[error("invalid calendar request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConferenceRequest {
    pub session_id: Uuid,
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: String,
    pub attendees: Vec<String>,
}

impl ConferenceRequest {
    pub fn for_session(
        session: &Session,
        mentor: &MentorProfile,
        participants: &[Option<&UserContact>],
        timezone: &str,
    ) -> Self {
        let start = session.starts_at();
        let attendees = participants
            .iter()
            .flatten()
            .filter(|contact| contact.has_email())
            .map(|contact| contact.email.clone())
            .collect();

        let mut description = format!(
            "Mentorship session booked through MentorHub.\nDuration: {} minutes",
            session.duration_minutes
        );
        if let Some(notes) = session.meeting_notes.as_deref().filter(|n| !n.is_empty()) {
            description.push_str("\n\n");
            description.push_str(notes);
        }

        Self {
            session_id: session.id,
            summary: format!("Mentorship session with {}", mentor.full_name),
            description,
            start,
            end: start + ChronoDuration::minutes(i64::from(session.duration_minutes)),
            timezone: timezone.to_string(),
            attendees,
        }
    }

    fn validate(&self) -> Result<(), CalendarError> {
        if self.summary.trim().is_empty() {
            return Err(CalendarError::InvalidRequest("event summary is empty".to_string()));
        }
        if self.end <= self.start {
            return Err(CalendarError::InvalidRequest(format!(
                "event ends at {} before it starts at {}",
                self.end, self.start
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceEvent {
    pub event_id: String,
    pub video_uri: String,
}

#[async_trait]
pub trait ConferenceProvider: Send + Sync {
    async fn create_event(&self, request: &ConferenceRequest) -> Result<ConferenceEvent, CalendarError>;
}

pub struct DisabledProvider;

#[async_trait]
impl ConferenceProvider for DisabledProvider {
    async fn create_event(&self, _request: &ConferenceRequest) -> Result<ConferenceEvent, CalendarError> {
        Err(CalendarError::Unavailable("calendar integration is disabled".to_string()))
    }
}

/// Creates Google Calendar events with a Meet conference attached.
pub struct GoogleCalendarProvider {
    client: reqwest::Client,
    config: CalendarConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEventResponse {
    id: String,
    conference_data: Option<ConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryPoint {
    entry_point_type: String,
    uri: String,
}

impl CalendarEventResponse {
    fn into_conference_event(self) -> Result<ConferenceEvent, CalendarError> {
        let video_uri = self
            .conference_data
            .into_iter()
            .flat_map(|data| data.entry_points)
            .find(|entry| entry.entry_point_type == "video" && !entry.uri.is_empty())
            .map(|entry| entry.uri)
            .ok_or_else(|| {
                CalendarError::Unavailable(format!("event {} has no video entry point", self.id))
            })?;

        Ok(ConferenceEvent {
            event_id: self.id,
            video_uri,
        })
    }
}

impl GoogleCalendarProvider {
    pub fn new(config: &CalendarConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build calendar client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.calendar_id
        )
    }

    fn event_body(request: &ConferenceRequest) -> serde_json::Value {
        let attendees: Vec<_> = request
            .attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect();

        json!({
            "summary": request.summary,
            "description": request.description,
            "start": {
                "dateTime": request.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": request.timezone,
            },
            "end": {
                "dateTime": request.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": request.timezone,
            },
            "attendees": attendees,
            "conferenceData": {
                "createRequest": {
                    "requestId": format!("session-{}-{}", request.session_id, Utc::now().timestamp()),
                    "conferenceSolutionKey": { "type": "hangoutsMeet" },
                },
            },
        })
    }
}

#[async_trait]
impl ConferenceProvider for GoogleCalendarProvider {
    async fn create_event(&self, request: &ConferenceRequest) -> Result<ConferenceEvent, CalendarError> {
        request.validate()?;

        if !self.config.enable_google_calendar {
            return Err(CalendarError::Unavailable("calendar integration is disabled".to_string()));
        }
        let token = self
            .config
            .access_token
            .as_deref()
            .ok_or_else(|| CalendarError::Unavailable("no calendar access token configured".to_string()))?;

        let response = self
            .client
            .post(self.events_url())
            .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
            .bearer_auth(token)
            .json(&Self::event_body(request))
            .send()
            .await
            .map_err(|e| CalendarError::Unavailable(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| CalendarError::Unavailable(format!("calendar API rejected the event: {}", e)))?;

        response
            .json::<CalendarEventResponse>()
            .await
            .map_err(|e| CalendarError::Unavailable(format!("undecodable calendar response: {}", e)))?
            .into_conference_event()
    }
}

/// Deterministic link for a session when no calendar event could be made.
pub fn fallback_meeting_link(session: &Session) -> String {
    let seed = format!(
        "codementor-{}-{}-{}-{}",
        session.mentor_id,
        session.mentee_id,
        session.session_date.format("%Y-%m-%d"),
        session.session_time.format("%H:%M:%S")
    );
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));

    format!("https://meet.google.com/codementor-{}-{}", session.id, &digest[..16])
}

/// Records the calendar event id in the session notes unless already present.
pub fn append_calendar_note(session: &mut Session, event_id: &str) {
    let marker = format!("[Calendar Event ID: {}]", event_id);
    let notes = session.meeting_notes.get_or_insert_with(String::new);

    if notes.contains(&marker) {
        return;
    }
    if !notes.is_empty() {
        notes.push_str("\n\n");
    }
    notes.push_str(&marker);
}

#[derive(Clone)]
pub struct MeetingLinkService {
    provider: Arc<dyn ConferenceProvider>,
    timezone: String,
}

impl MeetingLinkService {
    pub fn new(provider: Arc<dyn ConferenceProvider>, timezone: impl Into<String>) -> Self {
        Self {
            provider,
            timezone: timezone.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledProvider), "UTC")
    }

    /// Sets `session.meeting_link` and returns it.
    pub async fn generate(
        &self,
        session: &mut Session,
        mentor: &MentorProfile,
        mentor_contact: Option<&UserContact>,
        mentee: Option<&UserContact>,
    ) -> Result<String, AppError> {
        let request = ConferenceRequest::for_session(session, mentor, &[mentor_contact, mentee], &self.timezone);

        let link = match self.provider.create_event(&request).await {
            Ok(event) => {
                tracing::info!(session_id = %session.id, event_id = %event.event_id, "calendar event created");
                append_calendar_note(session, &event.event_id);
                event.video_uri
            }
            Err(CalendarError::Unavailable(reason)) => {
                tracing::warn!(session_id = %session.id, %reason, "calendar unavailable, using fallback meeting link");
                fallback_meeting_link(session)
            }
            Err(error @ CalendarError::InvalidRequest(_)) => {
                return Err(AppError::Internal(error.to_string()));
            }
        };

        session.meeting_link = Some(link.clone());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, Availability, PaymentStatus, SessionDuration, SessionStatus};
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal::Decimal;

    struct FixedProvider(Result<ConferenceEvent, fn() -> CalendarError>);

    #[async_trait]
    impl ConferenceProvider for FixedProvider {
        async fn create_event(&self, _request: &ConferenceRequest) -> Result<ConferenceEvent, CalendarError> {
            match &self.0 {
                Ok(event) => Ok(event.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn session() -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000001").unwrap(),
            mentor_id: Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000002").unwrap(),
            mentee_id: Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000003").unwrap(),
            session_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            session_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            duration_minutes: 60,
            status: SessionStatus::Pending,
            payment_status: PaymentStatus::Completed,
            amount_paid: Decimal::new(4000, 2),
            meeting_link: None,
            meeting_notes: Some("Wants to talk about Django".to_string()),
            admin_provided_link: None,
            link_provided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn mentor() -> MentorProfile {
        let now = Utc::now();
        MentorProfile {
            id: Uuid::parse_str("6f1c2a3b-0000-4000-8000-000000000002").unwrap(),
            user_id: None,
            full_name: "Dave The Mentor".to_string(),
            headline: "Expert Django Backend Dev".to_string(),
            bio: String::new(),
            location: None,
            linkedin_url: None,
            github_url: None,
            years_of_experience: 10,
            hourly_rate: Decimal::new(5000, 2),
            availability: Availability::default(),
            session_duration: SessionDuration::Hour,
            available_for: String::new(),
            application_status: ApplicationStatus::Approved,
            admin_notes: None,
            skills: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn contact(email: &str) -> UserContact {
        UserContact {
            user_id: Uuid::new_v4(),
            username: "mia".to_string(),
            email: email.to_string(),
            first_name: "Mia".to_string(),
        }
    }

    #[test]
    fn fallback_link_is_deterministic() {
        let first = fallback_meeting_link(&session());
        let second = fallback_meeting_link(&session());
        assert_eq!(first, second);

        let prefix = "https://meet.google.com/codementor-6f1c2a3b-0000-4000-8000-000000000001-";
        assert!(first.starts_with(prefix));
        let digest = &first[prefix.len()..];
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

        let mut moved = session();
        moved.session_time = NaiveTime::from_hms_opt(15, 0, 0).unwrap();
        assert_ne!(fallback_meeting_link(&moved), first);
    }

    #[test]
    fn calendar_note_is_appended_once() {
        let mut session = session();
        append_calendar_note(&mut session, "evt42");
        append_calendar_note(&mut session, "evt42");

        assert_eq!(
            session.meeting_notes.as_deref(),
            Some("Wants to talk about Django\n\n[Calendar Event ID: evt42]")
        );

        let mut bare = self::session();
        bare.meeting_notes = None;
        append_calendar_note(&mut bare, "evt7");
        assert_eq!(bare.meeting_notes.as_deref(), Some("[Calendar Event ID: evt7]"));
    }

    #[test]
    fn request_only_invites_participants_with_email() {
        let mentee = contact("mia@example.com");
        let mentor_contact = contact("");
        let request = ConferenceRequest::for_session(
            &session(),
            &mentor(),
            &[Some(&mentor_contact), Some(&mentee), None],
            "UTC",
        );

        assert_eq!(request.attendees, vec!["mia@example.com".to_string()]);
        assert_eq!(request.end - request.start, ChronoDuration::minutes(60));
        assert!(request.validate().is_ok());
    }

    #[tokio::test]
    async fn provider_link_wins_and_records_the_event() {
        let service = MeetingLinkService::new(
            Arc::new(FixedProvider(Ok(ConferenceEvent {
                event_id: "evt1".to_string(),
                video_uri: "https://meet.google.com/abc-defg-hij".to_string(),
            }))),
            "UTC",
        );
        let mut session = session();

        let link = service.generate(&mut session, &mentor(), None, None).await.unwrap();

        assert_eq!(link, "https://meet.google.com/abc-defg-hij");
        assert_eq!(session.meeting_link.as_deref(), Some(link.as_str()));
        assert!(session.meeting_notes.unwrap().contains("[Calendar Event ID: evt1]"));
    }

    #[tokio::test]
    async fn unavailable_provider_falls_back() {
        let service = MeetingLinkService::disabled();
        let mut session = session();

        let link = service.generate(&mut session, &mentor(), None, None).await.unwrap();

        assert_eq!(link, fallback_meeting_link(&session));
        assert_eq!(session.meeting_notes.as_deref(), Some("Wants to talk about Django"));
    }

    #[tokio::test]
    async fn invalid_requests_are_not_masked() {
        let service = MeetingLinkService::new(
            Arc::new(FixedProvider(Err(|| CalendarError::InvalidRequest("bad event".to_string())))),
            "UTC",
        );
        let mut session = session();

        let result = service.generate(&mut session, &mentor(), None, None).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(session.meeting_link.is_none());
    }

    #[tokio::test]
    async fn google_provider_without_token_is_unavailable() {
        let config = CalendarConfig {
            enable_google_calendar: true,
            ..CalendarConfig::default()
        };
        let provider = GoogleCalendarProvider::new(&config).unwrap();
        let request = ConferenceRequest::for_session(&session(), &mentor(), &[], "UTC");

        let result = provider.create_event(&request).await;
        assert!(matches!(result, Err(CalendarError::Unavailable(_))));
    }

    #[test]
    fn video_entry_point_is_extracted() {
        let response: CalendarEventResponse = serde_json::from_value(json!({
            "id": "evt9",
            "conferenceData": {
                "entryPoints": [
                    { "entryPointType": "phone", "uri": "tel:+1-555" },
                    { "entryPointType": "video", "uri": "https://meet.google.com/xyz" }
                ]
            }
        }))
        .unwrap();

        let event = response.into_conference_event().unwrap();
        assert_eq!(event.event_id, "evt9");
        assert_eq!(event.video_uri, "https://meet.google.com/xyz");

        let missing: CalendarEventResponse = serde_json::from_value(json!({ "id": "evt10" })).unwrap();
        assert!(matches!(missing.into_conference_event(), Err(CalendarError::Unavailable(_))));
    }

    #[test]
    fn event_body_requests_a_meet_conference() {
        let request = ConferenceRequest::for_session(&session(), &mentor(), &[], "Europe/Berlin");
        let body = GoogleCalendarProvider::event_body(&request);

        assert_eq!(body["start"]["dateTime"], "2030-06-01T14:00:00");
        assert_eq!(body["end"]["timeZone"], "Europe/Berlin");
        assert_eq!(body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"], "hangoutsMeet");
        let request_id = body["conferenceData"]["createRequest"]["requestId"].as_str().unwrap();
        assert!(request_id.starts_with("session-6f1c2a3b-0000-4000-8000-000000000001-"));
    }
}
