use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Reads a string variable, falling back to `default` when unset.
pub fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Reads and parses a variable, falling back to `default` when unset or
/// unparsable.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

pub fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    /// Full URL; takes precedence over the individual parts when set.
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("DATABASE_HOST", "localhost"),
            port: env_parse("DATABASE_PORT", 5432),
            username: env_string("DATABASE_USER", "postgres"),
            password: env_string("DATABASE_PASSWORD", "password"),
            database: env_string("DATABASE_NAME", "mentorhub"),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10),
            url: std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self {
            secret: env_string("JWT_SECRET", "mentorhub-development-secret"),
            expiration_hours: env_parse("JWT_EXPIRATION_HOURS", 24),
            issuer: env_string("JWT_ISSUER", "mentorhub"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env(default_port: u16) -> Self {
        let cors_origins = env_string("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Self {
            host: env_string("HOST", "0.0.0.0"),
            port: env_parse("PORT", default_port),
            cors_origins,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
