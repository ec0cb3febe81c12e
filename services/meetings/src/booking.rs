//! Session booking and status transitions.
//!
//! States run `pending -> confirmed -> completed | cancelled`; payment status
//! moves independently from `pending` to `completed` and never advances the
//! session itself. Only the owning mentor or an administrator confirms.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;
use validator::Validate;

use mentorhub_common::{AppError, Page, PageRequest};

use crate::config::BookingConfig;
use crate::meeting_link::MeetingLinkService;
use crate::models::{
    non_blank, weekday_key, AdminSessionQuery, AdminSessionSummary, AvailabilityResponse,
    BookSessionRequest, MenteeDashboard, MentorDashboard, MentorProfile, NewSession, PaymentStatus,
    Session, SessionFilter, SessionResponse, SessionStatus, SessionTransition, SetStatusRequest,
    UserContact,
};
use crate::mentors::NO_MENTOR_PROFILE;
use crate::notifications::{self, NotificationOutbox};
use crate::store::{MentorRepository, SessionRepository, SLOT_TAKEN_MESSAGE};

pub const SESSION_NOT_FOUND: &str = "Session not found";
pub const MENTOR_NOT_FOUND: &str = "Mentor not found";
pub const NOT_PENDING: &str = "This session is not pending.";
pub const PAST_BOOKING: &str = "You cannot book a session in the past. Please choose a future date and time.";
pub const ALREADY_PAID: &str = "Payment has already been completed for this session.";
pub const INVALID_ACTION: &str = "Invalid action.";
pub const SESSION_CHANGED: &str = "This session was updated by someone else. Please reload and try again.";

/// `rate * minutes / 60`, rounded half away from zero to cents.
pub fn compute_amount(hourly_rate: Decimal, duration_minutes: i32) -> Decimal {
    (hourly_rate * Decimal::from(duration_minutes) / Decimal::from(60))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn parse_action(action: &str) -> Result<SessionStatus, AppError> {
    action
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(INVALID_ACTION.to_string()))
}

fn validate_meeting_link(link: &str) -> Result<(), AppError> {
    let invalid = || AppError::Validation("Enter a valid meeting link (http or https URL).".to_string());

    if link.len() > 200 {
        return Err(invalid());
    }
    let parsed = url::Url::parse(link).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(invalid()),
    }
}

#[derive(Clone)]
pub struct BookingService {
    sessions: Arc<dyn SessionRepository>,
    mentors: Arc<dyn MentorRepository>,
    links: MeetingLinkService,
    outbox: NotificationOutbox,
    config: BookingConfig,
}

impl BookingService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        mentors: Arc<dyn MentorRepository>,
        links: MeetingLinkService,
        outbox: NotificationOutbox,
        config: BookingConfig,
    ) -> Self {
        Self {
            sessions,
            mentors,
            links,
            outbox,
            config,
        }
    }

    pub async fn book_session(
        &self,
        mentee_id: Uuid,
        mentor_id: Uuid,
        request: BookSessionRequest,
    ) -> Result<Session, AppError> {
        self.book_session_at(mentee_id, mentor_id, request, Utc::now().naive_utc())
            .await
    }

    /// Books against an explicit clock.
    pub async fn book_session_at(
        &self,
        mentee_id: Uuid,
        mentor_id: Uuid,
        request: BookSessionRequest,
        now: NaiveDateTime,
    ) -> Result<Session, AppError> {
        request.validate()?;

        let mentor = self.approved_mentor(mentor_id).await?;

        let duration = request
            .duration_minutes
            .unwrap_or_else(|| mentor.session_duration.minutes());
        if duration < self.config.min_duration_minutes || duration > self.config.max_duration_minutes {
            return Err(AppError::Validation(format!(
                "Duration must be between {} and {} minutes.",
                self.config.min_duration_minutes, self.config.max_duration_minutes
            )));
        }

        if request.session_date.and_time(request.session_time) < now {
            return Err(AppError::Validation(PAST_BOOKING.to_string()));
        }

        if self
            .sessions
            .slot_taken(mentor.id, request.session_date, request.session_time)
            .await?
        {
            return Err(AppError::Conflict(SLOT_TAKEN_MESSAGE.to_string()));
        }

        let session = self
            .sessions
            .insert_session(NewSession {
                mentor_id: mentor.id,
                mentee_id,
                session_date: request.session_date,
                session_time: request.session_time,
                duration_minutes: duration,
                amount_paid: compute_amount(mentor.hourly_rate, duration),
                meeting_notes: non_blank(request.notes),
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            mentor_id = %mentor.id,
            mentee_id = %mentee_id,
            amount = %session.amount_paid,
            "session booked"
        );
        Ok(session)
    }

    /// Simulated payment capture. The session stays `pending` until the
    /// mentor or an administrator confirms it.
    pub async fn pay_for_session(&self, mentee_id: Uuid, session_id: Uuid) -> Result<Session, AppError> {
        let session = self.mentee_session(mentee_id, session_id).await?;

        if session.payment_status == PaymentStatus::Completed {
            return Err(AppError::Conflict(ALREADY_PAID.to_string()));
        }

        let session = self
            .sessions
            .complete_payment(session.id)
            .await?
            .ok_or_else(|| AppError::Conflict(ALREADY_PAID.to_string()))?;
        tracing::info!(session_id = %session.id, mentee_id = %mentee_id, "payment captured");
        Ok(session)
    }

    pub async fn session_for_mentee(&self, mentee_id: Uuid, session_id: Uuid) -> Result<SessionResponse, AppError> {
        Ok(self.mentee_session(mentee_id, session_id).await?.into())
    }

    pub async fn mentee_dashboard(&self, mentee_id: Uuid) -> Result<MenteeDashboard, AppError> {
        self.mentee_dashboard_on(mentee_id, Utc::now().date_naive()).await
    }

    pub async fn mentee_dashboard_on(&self, mentee_id: Uuid, today: NaiveDate) -> Result<MenteeDashboard, AppError> {
        let sessions = self.sessions.sessions_for_mentee(mentee_id).await?;
        let limit = self.config.history_limit;

        let upcoming = sessions
            .iter()
            .filter(|s| s.status.is_active() && s.session_date >= today)
            .cloned()
            .map(SessionResponse::from)
            .collect();
        let past = sessions
            .iter()
            .rev()
            .filter(|s| s.status == SessionStatus::Completed)
            .take(limit)
            .cloned()
            .map(SessionResponse::from)
            .collect();
        let cancelled = sessions
            .iter()
            .rev()
            .filter(|s| s.status == SessionStatus::Cancelled)
            .take(limit)
            .cloned()
            .map(SessionResponse::from)
            .collect();

        Ok(MenteeDashboard {
            upcoming_sessions: upcoming,
            past_sessions: past,
            cancelled_sessions: cancelled,
        })
    }

    pub async fn mentor_dashboard(&self, user_id: Uuid) -> Result<MentorDashboard, AppError> {
        self.mentor_dashboard_on(user_id, Utc::now().date_naive()).await
    }

    pub async fn mentor_dashboard_on(&self, user_id: Uuid, today: NaiveDate) -> Result<MentorDashboard, AppError> {
        let mentor = self.mentor_for_actor(user_id).await?;
        let sessions = self.sessions.sessions_for_mentor(mentor.id).await?;

        let (upcoming, past): (Vec<Session>, Vec<Session>) = sessions
            .into_iter()
            .filter(|s| {
                (s.status.is_active() && s.session_date >= today) || s.status == SessionStatus::Completed
            })
            .partition(|s| s.status.is_active());

        Ok(MentorDashboard {
            mentor: mentor.into(),
            upcoming_sessions: upcoming.into_iter().map(SessionResponse::from).collect(),
            past_sessions: past.into_iter().rev().map(SessionResponse::from).collect(),
        })
    }

    pub async fn mentor_session_detail(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionResponse, AppError> {
        let mentor = self.mentor_for_actor(user_id).await?;
        Ok(self.mentor_session(&mentor, session_id).await?.into())
    }

    /// Mentor accepts a pending booking.
    pub async fn accept_session(&self, user_id: Uuid, session_id: Uuid) -> Result<Session, AppError> {
        let mentor = self.mentor_for_actor(user_id).await?;
        let read = self.mentor_session(&mentor, session_id).await?;

        if read.status != SessionStatus::Pending {
            return Err(AppError::Conflict(NOT_PENDING.to_string()));
        }

        let mut session = read.clone();
        let (mentor_contact, mentee) = self.participants(&mentor, &session).await?;
        if session.effective_meeting_link().is_empty() {
            self.links
                .generate(&mut session, &mentor, mentor_contact.as_ref(), mentee.as_ref())
                .await?;
        }

        // The link was generated without a lock; only a still-pending row is confirmed.
        let change = SessionTransition::new(&read, SessionStatus::Confirmed).with_changes(&read, &session);
        let session = self
            .sessions
            .transition_session(&change)
            .await?
            .ok_or_else(|| AppError::Conflict(NOT_PENDING.to_string()))?;
        tracing::info!(session_id = %session.id, mentor_id = %mentor.id, "session accepted by mentor");

        if let Some(mentee) = &mentee {
            self.outbox
                .enqueue(notifications::booking_confirmed_for_mentee(&session, &mentor, mentee));
            if let Some(contact) = &mentor_contact {
                self.outbox
                    .enqueue(notifications::booking_confirmed_for_mentor(&session, &mentor, contact, mentee));
            }
        }

        Ok(session)
    }

    /// Mentor marks a pending or confirmed session completed or cancelled.
    pub async fn mentor_set_status(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        action: &str,
    ) -> Result<Session, AppError> {
        let target = parse_action(action)?;
        if !matches!(target, SessionStatus::Completed | SessionStatus::Cancelled) {
            return Err(AppError::Validation(INVALID_ACTION.to_string()));
        }

        let mentor = self.mentor_for_actor(user_id).await?;
        let session = self.mentor_session(&mentor, session_id).await?;

        if !session.status.is_active() {
            return Err(AppError::Conflict(format!(
                "This session is already {}.",
                session.status.display_name().to_lowercase()
            )));
        }

        let previous = session.status;
        let session = self
            .sessions
            .transition_session(&SessionTransition::new(&session, target))
            .await?
            .ok_or_else(|| AppError::Conflict(SESSION_CHANGED.to_string()))?;
        tracing::info!(
            session_id = %session.id,
            mentor_id = %mentor.id,
            from = %previous,
            to = %target,
            "session status set by mentor"
        );

        if let Some(mentee) = self.sessions.user_contact(session.mentee_id).await? {
            self.outbox
                .enqueue(notifications::mentor_status_change(&session, &mentor, &mentee));
        }

        Ok(session)
    }

    /// Administrative override: any status to any status.
    pub async fn admin_set_status(
        &self,
        admin_id: Uuid,
        session_id: Uuid,
        request: SetStatusRequest,
    ) -> Result<Session, AppError> {
        let target = parse_action(&request.action)?;
        let supplied_link = non_blank(request.meeting_link);
        if target == SessionStatus::Confirmed {
            if let Some(link) = &supplied_link {
                validate_meeting_link(link)?;
            }
        }

        let read = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))?;
        let mentor = self
            .mentors
            .get_mentor(read.mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(MENTOR_NOT_FOUND.to_string()))?;

        let previous = read.status;
        let mut session = read.clone();

        let (mentor_contact, mentee) = self.participants(&mentor, &session).await?;
        if target == SessionStatus::Confirmed {
            if let Some(link) = supplied_link {
                session.admin_provided_link = Some(link);
                session.link_provided_at = Some(Utc::now());
            }
            if session.effective_meeting_link().is_empty() {
                self.links
                    .generate(&mut session, &mentor, mentor_contact.as_ref(), mentee.as_ref())
                    .await?;
            }
        }

        let change = SessionTransition::new(&read, target).with_changes(&read, &session);
        let session = self
            .sessions
            .transition_session(&change)
            .await?
            .ok_or_else(|| AppError::Conflict(SESSION_CHANGED.to_string()))?;
        tracing::info!(
            session_id = %session.id,
            admin_id = %admin_id,
            from = %previous,
            to = %target,
            "session status set by admin"
        );

        if let Some(mentee) = &mentee {
            self.outbox
                .enqueue(notifications::admin_status_change_for_mentee(&session, &mentor, mentee));
            if let Some(contact) = &mentor_contact {
                self.outbox.enqueue(notifications::admin_status_change_for_mentor(
                    &session, &mentor, contact, mentee,
                ));
            }
        }

        Ok(session)
    }

    pub async fn admin_sessions(&self, query: AdminSessionQuery) -> Result<Page<AdminSessionSummary>, AppError> {
        let status = match non_blank(query.status).as_deref() {
            None | Some("all") => None,
            Some(value) => Some(
                value
                    .parse::<SessionStatus>()
                    .map_err(|_| AppError::Validation(format!("Unknown session status '{}'.", value)))?,
            ),
        };
        let filter = SessionFilter {
            status,
            search: non_blank(query.q),
        };

        Ok(self
            .sessions
            .search_sessions(&filter, PageRequest::new(query.page, self.config.admin_page_size))
            .await?)
    }

    /// Advertised times for the date's weekday that no active session holds.
    pub async fn availability(&self, mentor_id: Uuid, date: NaiveDate) -> Result<AvailabilityResponse, AppError> {
        let mentor = self.approved_mentor(mentor_id).await?;
        let advertised = mentor.availability.times_on(date);
        let booked = self.sessions.booked_times(mentor.id, date).await?;

        let available = advertised
            .iter()
            .copied()
            .filter(|time| !booked.contains(time))
            .collect();

        Ok(AvailabilityResponse {
            mentor_id: mentor.id,
            date,
            weekday: weekday_key(date.weekday()),
            advertised,
            available,
        })
    }

    async fn approved_mentor(&self, mentor_id: Uuid) -> Result<MentorProfile, AppError> {
        self.mentors
            .get_mentor(mentor_id)
            .await?
            .filter(MentorProfile::is_approved)
            .ok_or_else(|| AppError::NotFound(MENTOR_NOT_FOUND.to_string()))
    }

    async fn mentor_for_actor(&self, user_id: Uuid) -> Result<MentorProfile, AppError> {
        self.mentors
            .mentor_for_user(user_id)
            .await?
            .ok_or_else(|| AppError::Authorization(NO_MENTOR_PROFILE.to_string()))
    }

    async fn mentee_session(&self, mentee_id: Uuid, session_id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .get_session(session_id)
            .await?
            .filter(|s| s.mentee_id == mentee_id)
            .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))
    }

    async fn mentor_session(&self, mentor: &MentorProfile, session_id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .get_session(session_id)
            .await?
            .filter(|s| s.mentor_id == mentor.id)
            .ok_or_else(|| AppError::NotFound(SESSION_NOT_FOUND.to_string()))
    }

    /// Linked mentor account (if any) and the mentee.
    async fn participants(
        &self,
        mentor: &MentorProfile,
        session: &Session,
    ) -> Result<(Option<UserContact>, Option<UserContact>), AppError> {
        let mentor_contact = match mentor.user_id {
            Some(user_id) => self.sessions.user_contact(user_id).await?,
            None => None,
        };
        let mentee = self.sessions.user_contact(session.mentee_id).await?;
        Ok((mentor_contact, mentee))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use chrono::NaiveTime;
    use tokio::sync::{mpsc::UnboundedReceiver, Notify};

    use crate::meeting_link::{CalendarError, ConferenceEvent, ConferenceProvider, ConferenceRequest};
    use crate::models::{ApplicationStatus, Availability, NewMentorProfile, SessionDuration};
    use crate::notifications::{EmailMessage, REFUND_NOTICE};
    use crate::store::MemoryStore;

    struct Fixture {
        service: BookingService,
        store: Arc<MemoryStore>,
        outbox: UnboundedReceiver<EmailMessage>,
        mentor: MentorProfile,
        mentor_user: UserContact,
        mentee: UserContact,
    }

    impl Fixture {
        fn sent(&mut self) -> Vec<EmailMessage> {
            let mut sent = Vec::new();
            while let Ok(message) = self.outbox.try_recv() {
                sent.push(message);
            }
            sent
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn before_june_2025() -> NaiveDateTime {
        date(2025, 5, 1).and_hms_opt(9, 0, 0).unwrap()
    }

    /// Holds `create_event` open until released.
    #[derive(Default)]
    struct GatedProvider {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ConferenceProvider for GatedProvider {
        async fn create_event(&self, _request: &ConferenceRequest) -> Result<ConferenceEvent, CalendarError> {
            self.entered.notify_one();
            self.release.notified().await;
            Err(CalendarError::Unavailable("gated".to_string()))
        }
    }

    async fn fixture(hourly_rate: Decimal, status: ApplicationStatus) -> Fixture {
        fixture_with_links(hourly_rate, status, MeetingLinkService::disabled()).await
    }

    async fn fixture_with_links(hourly_rate: Decimal, status: ApplicationStatus, links: MeetingLinkService) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mentor_user = store.add_user("mentor_dave", "dave@example.com", "Dave").await;
        let mentee = store.add_user("mia", "mia@example.com", "Mia").await;

        let mut availability = BTreeMap::new();
        availability.insert("sun".to_string(), vec!["10:00".to_string(), "14:00".to_string()]);

        let mentor = store
            .insert_mentor(NewMentorProfile {
                user_id: Some(mentor_user.user_id),
                full_name: "Dave The Mentor".to_string(),
                headline: "Expert Django Backend Dev".to_string(),
                bio: String::new(),
                location: None,
                linkedin_url: None,
                github_url: None,
                years_of_experience: 10,
                hourly_rate,
                availability: Availability(availability),
                session_duration: SessionDuration::Hour,
                available_for: String::new(),
                application_status: status,
                skill_ids: Vec::new(),
            })
            .await
            .unwrap();

        let (outbox, receiver) = NotificationOutbox::channel();
        let service = BookingService::new(
            store.clone(),
            store.clone(),
            links,
            outbox,
            BookingConfig::default(),
        );

        Fixture {
            service,
            store,
            outbox: receiver,
            mentor,
            mentor_user,
            mentee,
        }
    }

    fn request(session_date: NaiveDate, session_time: NaiveTime, duration: Option<i32>) -> BookSessionRequest {
        BookSessionRequest {
            session_date,
            session_time,
            duration_minutes: duration,
            notes: None,
        }
    }

    #[test]
    fn amount_is_prorated_and_rounded_to_cents() {
        assert_eq!(compute_amount(Decimal::new(5000, 2), 90), Decimal::new(7500, 2));
        assert_eq!(compute_amount(Decimal::new(4000, 2), 60), Decimal::new(4000, 2));
        // 33.33 * 45 / 60 = 24.9975
        assert_eq!(compute_amount(Decimal::new(3333, 2), 45), Decimal::new(2500, 2));
        // 0.01 * 30 / 60 = 0.005, half rounds away from zero
        assert_eq!(compute_amount(Decimal::new(1, 2), 30), Decimal::new(1, 2));
    }

    #[test]
    fn meeting_links_must_be_web_urls() {
        assert!(validate_meeting_link("https://zoom.us/j/42").is_ok());
        assert!(validate_meeting_link("http://meet.example.com/room").is_ok());
        assert!(validate_meeting_link("ftp://files.example.com").is_err());
        assert!(validate_meeting_link("not a link").is_err());
    }

    #[tokio::test]
    async fn booking_pay_accept_cancel_end_to_end() {
        let mut fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;

        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();
        assert_eq!(booked.status, SessionStatus::Pending);
        assert_eq!(booked.payment_status, PaymentStatus::Pending);
        assert_eq!(booked.amount_paid, Decimal::new(4000, 2));
        assert_eq!(booked.duration_minutes, 60);

        let paid = fx.service.pay_for_session(fx.mentee.user_id, booked.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Completed);
        assert_eq!(paid.status, SessionStatus::Pending);

        let accepted = fx
            .service
            .accept_session(fx.mentor_user.user_id, booked.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, SessionStatus::Confirmed);
        assert!(!accepted.effective_meeting_link().is_empty());

        let sent = fx.sent();
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(recipients, vec!["mia@example.com", "dave@example.com"]);
        assert_eq!(sent[0].subject, "Session Booked Successfully - MentorHub");

        let cancelled = fx
            .service
            .admin_set_status(
                Uuid::new_v4(),
                booked.id,
                SetStatusRequest {
                    action: "cancelled".to_string(),
                    meeting_link: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);

        let sent = fx.sent();
        assert_eq!(sent[0].to, "mia@example.com");
        assert_eq!(sent[0].subject, "Session Cancelled - MentorHub");
        assert!(sent[0].body.contains(REFUND_NOTICE));
    }

    #[tokio::test]
    async fn booking_uses_the_mentor_default_duration_and_prorates() {
        let fx = fixture(Decimal::new(5000, 2), ApplicationStatus::Approved).await;

        let session = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(10, 0), Some(90)), before_june_2025())
            .await
            .unwrap();

        assert_eq!(session.duration_minutes, 90);
        assert_eq!(session.amount_paid, Decimal::new(7500, 2));
    }

    #[tokio::test]
    async fn past_and_out_of_range_bookings_are_rejected() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let now = date(2025, 6, 1).and_hms_opt(15, 0, 0).unwrap();

        let past = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), now)
            .await;
        assert!(matches!(past, Err(AppError::Validation(msg)) if msg == PAST_BOOKING));

        let short = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 2), time(14, 0), Some(15)), now)
            .await;
        assert!(matches!(short, Err(AppError::Validation(msg)) if msg.contains("between 30 and 180")));
    }

    #[tokio::test]
    async fn unapproved_mentors_cannot_be_booked() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Pending).await;

        let result = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await;

        assert!(matches!(result, Err(AppError::NotFound(msg)) if msg == MENTOR_NOT_FOUND));
    }

    #[tokio::test]
    async fn a_held_slot_cannot_be_booked_twice() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let other = fx.store.add_user("noah", "noah@example.com", "Noah").await;
        let slot = request(date(2025, 6, 1), time(14, 0), None);

        fx.service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, slot.clone(), before_june_2025())
            .await
            .unwrap();
        let second = fx
            .service
            .book_session_at(other.user_id, fx.mentor.id, slot, before_june_2025())
            .await;

        assert!(matches!(second, Err(AppError::Conflict(msg)) if msg == SLOT_TAKEN_MESSAGE));
    }

    #[tokio::test]
    async fn concurrent_bookings_yield_one_session() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let mut handles = Vec::new();

        for i in 0..8 {
            let service = fx.service.clone();
            let mentee = fx.store.add_user(&format!("mentee{}", i), "", "").await;
            let mentor_id = fx.mentor.id;
            handles.push(tokio::spawn(async move {
                service
                    .book_session_at(mentee.user_id, mentor_id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
                    .await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::Conflict(msg)) => assert_eq!(msg, SLOT_TAKEN_MESSAGE),
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn accepting_a_non_pending_session_changes_nothing() {
        let mut fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();
        fx.service
            .mentor_set_status(fx.mentor_user.user_id, booked.id, "completed")
            .await
            .unwrap();
        fx.sent();

        let result = fx.service.accept_session(fx.mentor_user.user_id, booked.id).await;
        assert!(matches!(result, Err(AppError::Conflict(msg)) if msg == NOT_PENDING));

        let stored = fx.store.get_session(booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert!(stored.meeting_link.is_none());
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn payment_during_accept_is_kept() {
        let provider = Arc::new(GatedProvider::default());
        let fx = fixture_with_links(
            Decimal::new(4000, 2),
            ApplicationStatus::Approved,
            MeetingLinkService::new(provider.clone(), "UTC"),
        )
        .await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let service = fx.service.clone();
        let (mentor_user_id, session_id) = (fx.mentor_user.user_id, booked.id);
        let accept = tokio::spawn(async move { service.accept_session(mentor_user_id, session_id).await });
        provider.entered.notified().await;

        let paid = fx.service.pay_for_session(fx.mentee.user_id, booked.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Completed);

        provider.release.notify_one();
        let accepted = accept.await.unwrap().unwrap();
        assert_eq!(accepted.status, SessionStatus::Confirmed);
        assert_eq!(accepted.payment_status, PaymentStatus::Completed);

        let stored = fx.store.get_session(booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn admin_cancellation_during_accept_wins() {
        let provider = Arc::new(GatedProvider::default());
        let mut fx = fixture_with_links(
            Decimal::new(4000, 2),
            ApplicationStatus::Approved,
            MeetingLinkService::new(provider.clone(), "UTC"),
        )
        .await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let service = fx.service.clone();
        let (mentor_user_id, session_id) = (fx.mentor_user.user_id, booked.id);
        let accept = tokio::spawn(async move { service.accept_session(mentor_user_id, session_id).await });
        provider.entered.notified().await;

        fx.service
            .admin_set_status(
                Uuid::new_v4(),
                booked.id,
                SetStatusRequest {
                    action: "cancelled".to_string(),
                    meeting_link: None,
                },
            )
            .await
            .unwrap();
        fx.sent();

        provider.release.notify_one();
        let result = accept.await.unwrap();
        assert!(matches!(result, Err(AppError::Conflict(msg)) if msg == NOT_PENDING));

        let stored = fx.store.get_session(booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Cancelled);
        assert!(stored.meeting_link.is_none());
        assert!(fx.sent().is_empty());
    }

    #[tokio::test]
    async fn stale_admin_override_is_rejected() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();
        fx.service
            .mentor_set_status(fx.mentor_user.user_id, booked.id, "completed")
            .await
            .unwrap();

        // Decided against the pending row the admin saw.
        let stale = SessionTransition::new(&booked, SessionStatus::Confirmed);
        assert!(fx.store.transition_session(&stale).await.unwrap().is_none());

        let stored = fx.store.get_session(booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn mentor_cancellation_notifies_the_mentee_with_refund_notice() {
        let mut fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let invalid = fx.service.mentor_set_status(fx.mentor_user.user_id, booked.id, "confirmed").await;
        assert!(matches!(invalid, Err(AppError::Validation(msg)) if msg == INVALID_ACTION));

        let cancelled = fx
            .service
            .mentor_set_status(fx.mentor_user.user_id, booked.id, "cancelled")
            .await
            .unwrap();
        assert_eq!(cancelled.status, SessionStatus::Cancelled);

        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "mia@example.com");
        assert!(sent[0].body.contains(REFUND_NOTICE));

        let again = fx.service.mentor_set_status(fx.mentor_user.user_id, booked.id, "completed").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn other_users_cannot_touch_a_session() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let stranger = fx.store.add_user("eve", "eve@example.com", "Eve").await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let pay = fx.service.pay_for_session(stranger.user_id, booked.id).await;
        assert!(matches!(pay, Err(AppError::NotFound(msg)) if msg == SESSION_NOT_FOUND));

        let accept = fx.service.accept_session(stranger.user_id, booked.id).await;
        assert!(matches!(accept, Err(AppError::Authorization(msg)) if msg == NO_MENTOR_PROFILE));

        fx.service.pay_for_session(fx.mentee.user_id, booked.id).await.unwrap();
        let twice = fx.service.pay_for_session(fx.mentee.user_id, booked.id).await;
        assert!(matches!(twice, Err(AppError::Conflict(msg)) if msg == ALREADY_PAID));
    }

    #[tokio::test]
    async fn admin_confirmation_records_the_supplied_link() {
        let mut fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let bad = fx
            .service
            .admin_set_status(
                Uuid::new_v4(),
                booked.id,
                SetStatusRequest {
                    action: "confirmed".to_string(),
                    meeting_link: Some("javascript:alert(1)".to_string()),
                },
            )
            .await;
        assert!(matches!(bad, Err(AppError::Validation(_))));

        let confirmed = fx
            .service
            .admin_set_status(
                Uuid::new_v4(),
                booked.id,
                SetStatusRequest {
                    action: "confirmed".to_string(),
                    meeting_link: Some("https://zoom.us/j/42".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(confirmed.admin_provided_link.as_deref(), Some("https://zoom.us/j/42"));
        assert!(confirmed.link_provided_at.is_some());
        assert!(confirmed.meeting_link.is_none());
        assert_eq!(confirmed.effective_meeting_link(), "https://zoom.us/j/42");

        let sent = fx.sent();
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(recipients, vec!["mia@example.com", "dave@example.com"]);
        assert!(sent[1].body.contains("Meeting Link: https://zoom.us/j/42"));
    }

    #[tokio::test]
    async fn admin_confirmation_without_link_generates_one() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let confirmed = fx
            .service
            .admin_set_status(
                Uuid::new_v4(),
                booked.id,
                SetStatusRequest {
                    action: "confirmed".to_string(),
                    meeting_link: Some("   ".to_string()),
                },
            )
            .await
            .unwrap();

        assert!(confirmed.admin_provided_link.is_none());
        assert!(confirmed
            .meeting_link
            .as_deref()
            .is_some_and(|link| link.starts_with("https://meet.google.com/codementor-")));
    }

    #[tokio::test]
    async fn availability_hides_held_slots() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        // 2025-06-01 is a Sunday
        fx.service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();

        let availability = fx.service.availability(fx.mentor.id, date(2025, 6, 1)).await.unwrap();

        assert_eq!(availability.weekday, "sun");
        assert_eq!(availability.advertised, vec![time(10, 0), time(14, 0)]);
        assert_eq!(availability.available, vec![time(10, 0)]);
    }

    #[tokio::test]
    async fn cancelled_sessions_free_the_slot_for_the_pre_check_only() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let booked = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await
            .unwrap();
        fx.service
            .mentor_set_status(fx.mentor_user.user_id, booked.id, "cancelled")
            .await
            .unwrap();

        let availability = fx.service.availability(fx.mentor.id, date(2025, 6, 1)).await.unwrap();
        assert!(availability.available.contains(&time(14, 0)));

        // storage still holds the (mentor, date, time) tuple
        let rebook = fx
            .service
            .book_session_at(fx.mentee.user_id, fx.mentor.id, request(date(2025, 6, 1), time(14, 0), None), before_june_2025())
            .await;
        assert!(matches!(rebook, Err(AppError::Conflict(msg)) if msg == SLOT_TAKEN_MESSAGE));
    }

    #[tokio::test]
    async fn mentee_dashboard_buckets_sessions() {
        let fx = fixture(Decimal::new(4000, 2), ApplicationStatus::Approved).await;
        let book = |d: NaiveDate, t: NaiveTime| {
            let service = fx.service.clone();
            let mentee_id = fx.mentee.user_id;
            let mentor_id = fx.mentor.id;
            async move {
                service
                    .book_session_at(mentee_id, mentor_id, request(d, t, None), before_june_2025())
                    .await
                    .unwrap()
            }
        };

        let upcoming = book(date(2025, 6, 8), time(10, 0)).await;
        let done = book(date(2025, 6, 1), time(10, 0)).await;
        let dropped = book(date(2025, 6, 1), time(14, 0)).await;
        fx.service
            .mentor_set_status(fx.mentor_user.user_id, done.id, "completed")
            .await
            .unwrap();
        fx.service
            .mentor_set_status(fx.mentor_user.user_id, dropped.id, "cancelled")
            .await
            .unwrap();

        let dashboard = fx
            .service
            .mentee_dashboard_on(fx.mentee.user_id, date(2025, 6, 2))
            .await
            .unwrap();

        assert_eq!(dashboard.upcoming_sessions.len(), 1);
        assert_eq!(dashboard.upcoming_sessions[0].session.id, upcoming.id);
        assert_eq!(dashboard.past_sessions[0].session.id, done.id);
        assert_eq!(dashboard.cancelled_sessions[0].session.id, dropped.id);

        let mentor_view = fx
            .service
            .mentor_dashboard_on(fx.mentor_user.user_id, date(2025, 6, 2))
            .await
            .unwrap();
        assert_eq!(mentor_view.upcoming_sessions.len(), 1);
        assert_eq!(mentor_view.past_sessions.len(), 1);
        assert!(mentor_view.mentor.is_approved);
    }
}
