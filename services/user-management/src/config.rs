use serde::{Deserialize, Serialize};

use mentorhub_common::{env_parse, env_string, DatabaseConfig, JwtConfig, ServerConfig};
use mentorhub_mailer::NotificationConfig;

pub const DEFAULT_PORT: u16 = 8001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserManagementConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub accounts: AccountConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Users per page on the admin user list.
    pub admin_page_size: u32,
    pub reset_token_ttl_minutes: i64,
    /// Prefix of the reset link mailed to users.
    pub public_base_url: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            admin_page_size: 20,
            reset_token_ttl_minutes: 60,
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl UserManagementConfig {
    pub fn from_env() -> Self {
        let defaults = AccountConfig::default();

        Self {
            server: ServerConfig::from_env(DEFAULT_PORT),
            database: DatabaseConfig::from_env(),
            jwt: JwtConfig::from_env(),
            accounts: AccountConfig {
                admin_page_size: env_parse("ADMIN_USERS_PAGE_SIZE", defaults.admin_page_size).max(1),
                reset_token_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", defaults.reset_token_ttl_minutes).max(1),
                public_base_url: env_string("PUBLIC_BASE_URL", &defaults.public_base_url),
            },
            notifications: NotificationConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_defaults() {
        let accounts = AccountConfig::default();
        assert_eq!(accounts.admin_page_size, 20);
        assert_eq!(accounts.reset_token_ttl_minutes, 60);
    }
}
