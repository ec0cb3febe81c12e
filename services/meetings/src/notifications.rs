//! Session email templates. Delivery lives in `mentorhub-mailer`.

pub use mentorhub_mailer::{
    mailer_from_config, EmailMessage, LogMailer, MailError, Mailer, NotificationDispatcher,
    NotificationOutbox, SmtpMailer,
};

use crate::models::{MentorProfile, Session, SessionStatus, UserContact};

const SIGNATURE: &str = "Best regards,\nThe MentorHub Team";

pub const REFUND_NOTICE: &str =
    "A refund will be credited to your original payment method within 3 business days.";

fn slot(session: &Session) -> String {
    format!(
        "{} at {}",
        session.session_date.format("%Y-%m-%d"),
        session.session_time.format("%H:%M")
    )
}

fn details(session: &Session) -> String {
    format!(
        "Session Details:\nDate: {}\nTime: {}\nDuration: {} minutes\nMeeting Link: {}",
        session.session_date.format("%Y-%m-%d"),
        session.session_time.format("%H:%M"),
        session.duration_minutes,
        session.effective_meeting_link()
    )
}

/// Sent to the mentee when the mentor accepts a booking.
pub fn booking_confirmed_for_mentee(session: &Session, mentor: &MentorProfile, mentee: &UserContact) -> EmailMessage {
    EmailMessage {
        to: mentee.email.clone(),
        subject: "Session Booked Successfully - MentorHub".to_string(),
        body: format!(
            "Hello {},\n\nYour session with {} has been confirmed!\n\n{}\n\n\
             Please join the meeting 5 minutes before the scheduled time.\n\n{}",
            mentee.display_name(),
            mentor.full_name,
            details(session),
            SIGNATURE
        ),
    }
}

/// Sent to the mentor's linked account when a booking is accepted.
pub fn booking_confirmed_for_mentor(
    session: &Session,
    mentor: &MentorProfile,
    mentor_contact: &UserContact,
    mentee: &UserContact,
) -> EmailMessage {
    EmailMessage {
        to: mentor_contact.email.clone(),
        subject: "New Session Booked - MentorHub".to_string(),
        body: format!(
            "Hello {},\n\nYou have a new session booked with {}!\n\n{}\n\n\
             Please be ready 5 minutes before the scheduled time.\n\n{}",
            mentor.full_name,
            mentee.display_name(),
            details(session),
            SIGNATURE
        ),
    }
}

/// Sent to the mentee after the mentor completes or cancels a session.
pub fn mentor_status_change(session: &Session, mentor: &MentorProfile, mentee: &UserContact) -> EmailMessage {
    let body = match session.status {
        SessionStatus::Cancelled => format!(
            "Hello {},\n\nWe're sorry to inform you that your session with {} on {} was cancelled by the mentor.\n\n\
             {}\n\nIf you have any questions, please contact support.\n\n{}",
            mentee.display_name(),
            mentor.full_name,
            slot(session),
            REFUND_NOTICE,
            SIGNATURE
        ),
        status => format!(
            "Hello {},\n\nYour session with {} scheduled on {} has been marked as {}.\n\n\
             If you have any questions, please contact the mentor or support.\n\n{}",
            mentee.display_name(),
            mentor.full_name,
            slot(session),
            status.display_name().to_lowercase(),
            SIGNATURE
        ),
    };

    EmailMessage {
        to: mentee.email.clone(),
        subject: format!("Session {} - MentorHub", session.status.display_name()),
        body,
    }
}

/// Sent to the mentee after an administrator sets a session's status.
pub fn admin_status_change_for_mentee(session: &Session, mentor: &MentorProfile, mentee: &UserContact) -> EmailMessage {
    let greeting = format!("Hello {},\n\n", mentee.display_name());
    let message = match session.status {
        SessionStatus::Completed => format!(
            "Your session with {} on {} has been marked as completed.\n\nThank you for using MentorHub!",
            mentor.full_name,
            slot(session)
        ),
        SessionStatus::Cancelled => format!(
            "Your session with {} on {} has been cancelled.\n\n{}\n\nIf you have any questions, please contact support.",
            mentor.full_name,
            slot(session),
            REFUND_NOTICE
        ),
        SessionStatus::Confirmed => format!(
            "Your session with {} has been confirmed!\n\n{}\n\n\
             Please join the meeting 5 minutes before the scheduled time.",
            mentor.full_name,
            details(session)
        ),
        SessionStatus::Pending => format!(
            "Your session with {} on {} status has been updated to {}.",
            mentor.full_name,
            slot(session),
            session.status.display_name()
        ),
    };

    EmailMessage {
        to: mentee.email.clone(),
        subject: format!("Session {} - MentorHub", session.status.display_name()),
        body: format!("{}{}\n\n{}", greeting, message, SIGNATURE),
    }
}

/// Sent to the mentor's linked account after an administrator sets a session's status.
pub fn admin_status_change_for_mentor(
    session: &Session,
    mentor: &MentorProfile,
    mentor_contact: &UserContact,
    mentee: &UserContact,
) -> EmailMessage {
    let message = match session.status {
        SessionStatus::Confirmed => format!(
            "Your session with {} has been confirmed!\n\n{}\n\n\
             Please join the meeting 5 minutes before the scheduled time.",
            mentee.display_name(),
            details(session)
        ),
        status => format!(
            "Your session with {} on {} has been marked as {} by an administrator.",
            mentee.display_name(),
            slot(session),
            status.display_name().to_lowercase()
        ),
    };

    EmailMessage {
        to: mentor_contact.email.clone(),
        subject: format!("Session {} - MentorHub", session.status.display_name()),
        body: format!("Hello {},\n\n{}\n\n{}", mentor.full_name, message, SIGNATURE),
    }
}
