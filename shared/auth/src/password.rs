use bcrypt::{hash, verify, DEFAULT_COST};
use mentorhub_common::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String, AppError> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Malformed stored hashes count as a mismatch.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        verify(password, hash).unwrap_or(false)
    }

    pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long.",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    /// Checks a new password against its confirmation and the length rule.
    pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), AppError> {
        if password != confirm {
            return Err(AppError::Validation("Passwords do not match.".to_string()));
        }
        Self::validate_password_strength(password)
    }
}
