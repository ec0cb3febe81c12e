use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use mentorhub_common::{AppError, PageRequest};
use mentorhub_database::{create_pool, run_migrations};
use mentorhub_meetings::{
    booking::BookingService,
    config::{BookingConfig, MeetingsConfig},
    meeting_link::MeetingLinkService,
    models::{
        ApplicationStatus, Availability, BookSessionRequest, MentorFilter, MentorProfile,
        NewMentorProfile, NewSession, PaymentStatus, SessionDuration, SessionFilter, SessionStatus,
        SessionTransition, UserContact,
    },
    notifications::NotificationOutbox,
    store::{MentorRepository, PgStore, SessionRepository, StoreError, SLOT_TAKEN_MESSAGE},
};

// Skip test if no database is available
async fn test_pool() -> Option<PgPool> {
    if std::env::var("DATABASE_URL").is_err() {
        println!("Skipping database test - DATABASE_URL not set");
        return None;
    }

    let config = MeetingsConfig::from_env();
    let pool = create_pool(&config.database).await.expect("Failed to connect to test database");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Some(pool)
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

async fn insert_user(pool: &PgPool, username: &str) -> UserContact {
    let contact = UserContact {
        user_id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: "Test".to_string(),
    };
    sqlx::query(
        "INSERT INTO users (user_id, username, email, first_name, hashed_password) VALUES ($1, $2, $3, $4, 'unused')",
    )
    .bind(contact.user_id)
    .bind(&contact.username)
    .bind(&contact.email)
    .bind(&contact.first_name)
    .execute(pool)
    .await
    .unwrap();
    contact
}

async fn insert_mentor(store: &PgStore, owner: &UserContact, full_name: &str, skill_ids: Vec<Uuid>) -> MentorProfile {
    let mut availability = BTreeMap::new();
    availability.insert("sun".to_string(), vec!["10:00".to_string()]);

    store
        .insert_mentor(NewMentorProfile {
            user_id: Some(owner.user_id),
            full_name: full_name.to_string(),
            headline: "Backend mentor".to_string(),
            bio: String::new(),
            location: None,
            linkedin_url: None,
            github_url: None,
            years_of_experience: 8,
            hourly_rate: Decimal::new(4000, 2),
            availability: Availability(availability),
            session_duration: SessionDuration::Hour,
            available_for: String::new(),
            application_status: ApplicationStatus::Approved,
            skill_ids,
        })
        .await
        .unwrap()
}

fn slot() -> (NaiveDate, NaiveTime) {
    (
        NaiveDate::from_ymd_opt(2030, 6, 2).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    )
}

fn long_ago() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

#[tokio::test]
async fn test_double_booking_is_a_slot_conflict() {
    let Some(pool) = test_pool().await else { return };
    let store = Arc::new(PgStore::new(pool.clone()));
    let (outbox, _receiver) = NotificationOutbox::channel();
    let service = BookingService::new(
        store.clone(),
        store.clone(),
        MeetingLinkService::disabled(),
        outbox,
        BookingConfig::default(),
    );

    let owner = insert_user(&pool, &unique("mentor")).await;
    let first = insert_user(&pool, &unique("mentee")).await;
    let second = insert_user(&pool, &unique("mentee")).await;
    let mentor = insert_mentor(&store, &owner, "Dave The Mentor", Vec::new()).await;
    let (date, time) = slot();
    let request = BookSessionRequest {
        session_date: date,
        session_time: time,
        duration_minutes: None,
        notes: None,
    };

    let booked = service
        .book_session_at(first.user_id, mentor.id, request.clone(), long_ago())
        .await
        .unwrap();
    assert_eq!(booked.amount_paid, Decimal::new(4000, 2));

    let again = service
        .book_session_at(second.user_id, mentor.id, request, long_ago())
        .await;
    assert!(matches!(again, Err(AppError::Conflict(msg)) if msg == SLOT_TAKEN_MESSAGE));

    // Past the pre-check, the unique constraint answers the same way.
    let raced = store
        .insert_session(NewSession {
            mentor_id: mentor.id,
            mentee_id: second.user_id,
            session_date: date,
            session_time: time,
            duration_minutes: 60,
            amount_paid: Decimal::new(4000, 2),
            meeting_notes: None,
        })
        .await;
    assert!(matches!(raced, Err(StoreError::SlotTaken)));
    let err: AppError = raced.unwrap_err().into();
    assert!(matches!(err, AppError::Conflict(msg) if msg == SLOT_TAKEN_MESSAGE));
}

#[tokio::test]
async fn test_transitions_are_conditional() {
    let Some(pool) = test_pool().await else { return };
    let store = PgStore::new(pool.clone());

    let owner = insert_user(&pool, &unique("mentor")).await;
    let mentee = insert_user(&pool, &unique("mentee")).await;
    let mentor = insert_mentor(&store, &owner, "Dave The Mentor", Vec::new()).await;
    let (date, time) = slot();
    let pending = store
        .insert_session(NewSession {
            mentor_id: mentor.id,
            mentee_id: mentee.user_id,
            session_date: date,
            session_time: time,
            duration_minutes: 60,
            amount_paid: Decimal::new(4000, 2),
            meeting_notes: Some("Intro call".to_string()),
        })
        .await
        .unwrap();

    let paid = store.complete_payment(pending.id).await.unwrap().unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.status, SessionStatus::Pending);
    assert!(store.complete_payment(pending.id).await.unwrap().is_none());

    let mut edited = pending.clone();
    edited.meeting_link = Some("https://meet.google.com/generated".to_string());
    let confirm = SessionTransition::new(&pending, SessionStatus::Confirmed).with_changes(&pending, &edited);
    let confirmed = store.transition_session(&confirm).await.unwrap().unwrap();
    assert_eq!(confirmed.status, SessionStatus::Confirmed);
    assert_eq!(confirmed.payment_status, PaymentStatus::Completed);
    assert_eq!(confirmed.meeting_link.as_deref(), Some("https://meet.google.com/generated"));
    assert_eq!(confirmed.meeting_notes.as_deref(), Some("Intro call"));

    // Still decided from `pending`, so it no longer applies.
    let stale = SessionTransition::new(&pending, SessionStatus::Cancelled);
    assert!(store.transition_session(&stale).await.unwrap().is_none());
    let stored = store.get_session(pending.id).await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Confirmed);
}

#[tokio::test]
async fn test_directory_and_admin_filters() {
    let Some(pool) = test_pool().await else { return };
    let store = PgStore::new(pool.clone());

    let skill_name = unique("skill");
    let skill = store.get_or_create_skill(&skill_name).await.unwrap();
    assert_eq!(store.get_or_create_skill(&skill_name).await.unwrap().id, skill.id);

    let owner = insert_user(&pool, &unique("mentor")).await;
    let mentee = insert_user(&pool, &unique("mentee")).await;
    let full_name = unique("Dave");
    let mentor = insert_mentor(&store, &owner, &full_name, vec![skill.id]).await;
    assert_eq!(mentor.skills.len(), 1);

    let by_skill = store
        .search_mentors(&MentorFilter::directory(None, Some(skill_name.to_uppercase())), PageRequest::new(None, 12))
        .await
        .unwrap();
    assert_eq!(by_skill.total, 1);
    assert_eq!(by_skill.items[0].id, mentor.id);

    let by_search = store
        .search_mentors(&MentorFilter::directory(Some(skill_name.clone()), None), PageRequest::new(None, 12))
        .await
        .unwrap();
    assert_eq!(by_search.total, 1);

    let by_username = store
        .search_mentors(&MentorFilter::admin(None, Some(owner.username.clone())), PageRequest::new(None, 20))
        .await
        .unwrap();
    assert_eq!(by_username.total, 1);
    assert_eq!(by_username.items[0].full_name, full_name);

    let pending_only = store
        .search_mentors(
            &MentorFilter::admin(Some(ApplicationStatus::Pending), Some(owner.username.clone())),
            PageRequest::new(None, 20),
        )
        .await
        .unwrap();
    assert_eq!(pending_only.total, 0);

    let (date, time) = slot();
    store
        .insert_session(NewSession {
            mentor_id: mentor.id,
            mentee_id: mentee.user_id,
            session_date: date,
            session_time: time,
            duration_minutes: 60,
            amount_paid: Decimal::new(4000, 2),
            meeting_notes: None,
        })
        .await
        .unwrap();

    let by_mentee = store
        .search_sessions(
            &SessionFilter {
                status: Some(SessionStatus::Pending),
                search: Some(mentee.username.clone()),
            },
            PageRequest::new(None, 20),
        )
        .await
        .unwrap();
    assert_eq!(by_mentee.total, 1);
    assert_eq!(by_mentee.items[0].mentor_name, full_name);
    assert_eq!(by_mentee.items[0].mentee.user_id, mentee.user_id);

    let confirmed_only = store
        .search_sessions(
            &SessionFilter {
                status: Some(SessionStatus::Confirmed),
                search: Some(mentee.username.clone()),
            },
            PageRequest::new(None, 20),
        )
        .await
        .unwrap();
    assert_eq!(confirmed_only.total, 0);

    assert!(store.delete_mentor(mentor.id).await.unwrap());
    assert!(store.sessions_for_mentee(mentee.user_id).await.unwrap().is_empty());
}
