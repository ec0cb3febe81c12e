use mentorhub_common::{env_bool, env_parse, env_string, DatabaseConfig, JwtConfig, ServerConfig};
use serde::{Deserialize, Serialize};

pub use mentorhub_mailer::NotificationConfig;

pub const DEFAULT_PORT: u16 = 8004;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingsConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
    pub notifications: NotificationConfig,
    pub calendar: CalendarConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    pub min_duration_minutes: i32,
    pub max_duration_minutes: i32,
    pub directory_page_size: u32,
    pub admin_page_size: u32,
    /// How many completed or cancelled sessions a mentee dashboard shows.
    pub history_limit: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            min_duration_minutes: 30,
            max_duration_minutes: 180,
            directory_page_size: 12,
            admin_page_size: 20,
            history_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub enable_google_calendar: bool,
    pub calendar_id: String,
    /// Pre-provisioned OAuth access token for the calendar API.
    pub access_token: Option<String>,
    pub api_base_url: String,
    pub timezone: String,
    pub request_timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enable_google_calendar: false,
            calendar_id: "primary".to_string(),
            access_token: None,
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            timezone: "UTC".to_string(),
            request_timeout_secs: 10,
        }
    }
}

impl MeetingsConfig {
    pub fn from_env() -> Self {
        let booking_defaults = BookingConfig::default();
        let calendar_defaults = CalendarConfig::default();

        Self {
            server: ServerConfig::from_env(DEFAULT_PORT),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            booking: BookingConfig {
                min_duration_minutes: env_parse("BOOKING_MIN_DURATION_MINUTES", booking_defaults.min_duration_minutes),
                max_duration_minutes: env_parse("BOOKING_MAX_DURATION_MINUTES", booking_defaults.max_duration_minutes),
                directory_page_size: env_parse("DIRECTORY_PAGE_SIZE", booking_defaults.directory_page_size),
                admin_page_size: env_parse("ADMIN_PAGE_SIZE", booking_defaults.admin_page_size),
                history_limit: env_parse("DASHBOARD_HISTORY_LIMIT", booking_defaults.history_limit),
            },
            notifications: NotificationConfig::from_env(),
            calendar: CalendarConfig {
                enable_google_calendar: env_bool("ENABLE_GOOGLE_CALENDAR", false),
                calendar_id: env_string("GOOGLE_CALENDAR_ID", &calendar_defaults.calendar_id),
                access_token: std::env::var("GOOGLE_CALENDAR_ACCESS_TOKEN")
                    .ok()
                    .filter(|token| !token.is_empty()),
                api_base_url: env_string("GOOGLE_CALENDAR_API_URL", &calendar_defaults.api_base_url),
                timezone: env_string("CALENDAR_TIMEZONE", &calendar_defaults.timezone),
                request_timeout_secs: env_parse("CALENDAR_TIMEOUT_SECS", calendar_defaults.request_timeout_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_defaults_match_the_published_limits() {
        let booking = BookingConfig::default();
        assert_eq!(booking.min_duration_minutes, 30);
        assert_eq!(booking.max_duration_minutes, 180);
        assert_eq!(booking.directory_page_size, 12);
        assert_eq!(booking.admin_page_size, 20);
    }

    #[test]
    fn integrations_are_off_unless_enabled() {
        assert!(!NotificationConfig::default().enable_email_notifications);
        assert!(!CalendarConfig::default().enable_google_calendar);
        assert!(CalendarConfig::default().access_token.is_none());
    }
}
