// Password hashing and the Register-time complexity check.
//
// Work factor is configurable; values below the safe floor are clamped up
// rather than rejected, so a misconfigured environment degrades to "slower
// than requested" instead of "insecure".

use crate::middleware::error_handling::{AppError, Result};

pub const MIN_BCRYPT_COST: u32 = 10;
pub const DEFAULT_BCRYPT_COST: u32 = 12;
pub const MIN_PASSWORD_LENGTH: usize = 12;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(configured_cost: u32) -> Self {
        let cost = if configured_cost < MIN_BCRYPT_COST {
            tracing::warn!(
                configured_cost,
                floor = MIN_BCRYPT_COST,
                "bcrypt cost below safe floor, clamping up"
            );
            MIN_BCRYPT_COST
        } else {
            configured_cost
        };
        Self { cost }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String> {
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Constant-time by construction: bcrypt::verify always walks the full hash.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(plaintext, hash)?)
    }
}

/// Register-only complexity gate: length >= 12, at least one upper, one
/// lower, one digit, one non-alphanumeric character.
pub fn validate_password_complexity(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::InvalidArgument(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password.chars().any(|c| !c.is_alphanumeric());

    if !(has_upper && has_lower && has_digit && has_symbol) {
        return Err(AppError::InvalidArgument(
            "password must contain an uppercase letter, a lowercase letter, a digit, and a symbol"
                .to_string(),
        ));
    }
    Ok(())
}
