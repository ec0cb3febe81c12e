use mentorhub_common::{env_bool, env_parse, env_string, RetryPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enable_email_notifications: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    pub retry: RetryPolicy,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enable_email_notifications: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_email: "noreply@mentorhub.dev".to_string(),
            from_name: "MentorHub".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry_defaults = RetryPolicy::default();

        Self {
            enable_email_notifications: env_bool("ENABLE_EMAIL_NOTIFICATIONS", false),
            smtp_host: env_string("SMTP_HOST", &defaults.smtp_host),
            smtp_port: env_parse("SMTP_PORT", defaults.smtp_port),
            smtp_username: env_string("SMTP_USERNAME", ""),
            smtp_password: env_string("SMTP_PASSWORD", ""),
            from_email: env_string("FROM_EMAIL", &defaults.from_email),
            from_name: env_string("FROM_NAME", &defaults.from_name),
            retry: RetryPolicy {
                max_attempts: env_parse("EMAIL_MAX_ATTEMPTS", retry_defaults.max_attempts),
                base_delay_ms: env_parse("EMAIL_RETRY_BASE_DELAY_MS", retry_defaults.base_delay_ms),
                max_delay_ms: env_parse("EMAIL_RETRY_MAX_DELAY_MS", retry_defaults.max_delay_ms),
                backoff_multiplier: retry_defaults.backoff_multiplier,
            },
        }
    }
}
