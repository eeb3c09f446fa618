//! Password policy value object and validator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::errors::{AuthError, Result};

/// The set of characters that satisfy the special-character class.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`";

/// Password policy parameters.
///
/// Treat as immutable after construction: services take it by value at
/// construction time and never change it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum password length. Must be at least 8.
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    /// Number of prior hashes retained for reuse checks.
    pub password_history_size: usize,
    /// Password lifetime in days; 0 means no expiry.
    pub password_expiry_days: u32,
    /// Failed attempts within the lockout window that trigger a lockout.
    /// Must be at least 1.
    pub max_failed_attempts: u32,
    /// Sliding window over which failed attempts are counted.
    pub lockout_window_minutes: u64,
    /// How long an account stays locked once the threshold is hit.
    pub lockout_duration_minutes: u64,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            password_history_size: 5,
            password_expiry_days: 90,
            max_failed_attempts: 10,
            lockout_window_minutes: 15,
            lockout_duration_minutes: 30,
        }
    }
}

impl PasswordPolicy {
    /// Build a policy from the runtime configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            min_length: config.password_min_length,
            require_uppercase: config.require_password_complexity,
            require_lowercase: config.require_password_complexity,
            require_digit: config.require_password_complexity,
            require_special: config.require_password_complexity,
            password_history_size: config.password_history_size,
            password_expiry_days: config.password_expiration_days,
            max_failed_attempts: config.max_login_attempts,
            lockout_window_minutes: 15,
            lockout_duration_minutes: config.account_lockout_minutes,
        }
    }

    /// Check the policy's own invariants.
    pub fn validate(&self) -> Result<()> {
        if self.min_length < 8 {
            return Err(AuthError::config(
                "minimum password length must be at least 8 characters",
            ));
        }
        if self.max_failed_attempts < 1 {
            return Err(AuthError::config("max failed attempts must be at least 1"));
        }
        Ok(())
    }

    /// The expiration instant for a password set at `from`, or `None` when the
    /// policy disables expiry.
    pub fn expiry(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.password_expiry_days == 0 {
            None
        } else {
            Some(from + Duration::days(i64::from(self.password_expiry_days)))
        }
    }
}

/// Outcome of validating a password against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyValidationResult {
    pub valid: bool,
    pub violations: Vec<String>,
}

impl PolicyValidationResult {
    fn passed() -> Self {
        Self {
            valid: true,
            violations: Vec::new(),
        }
    }

    fn failed(violations: Vec<String>) -> Self {
        Self {
            valid: false,
            violations,
        }
    }
}

/// Validates candidate passwords against a [`PasswordPolicy`].
///
/// All failing checks are reported, in a fixed order, so callers can surface
/// the complete set to the user.
#[derive(Debug, Clone)]
pub struct PasswordPolicyValidator {
    policy: PasswordPolicy,
}

impl PasswordPolicyValidator {
    /// Create a validator enforcing the given policy.
    pub fn new(policy: PasswordPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    /// The policy enforced by this validator.
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Validate a candidate password, reporting every violation.
    pub fn validate(&self, password: &str) -> PolicyValidationResult {
        if password.is_empty() {
            return PolicyValidationResult::failed(vec![
                "password cannot be empty".to_string(),
            ]);
        }

        let mut violations = Vec::new();

        if password.chars().count() < self.policy.min_length {
            violations.push(format!(
                "password must be at least {} characters long",
                self.policy.min_length
            ));
        }
        if self.policy.require_uppercase && !password.chars().any(char::is_uppercase) {
            violations.push("password must contain at least one uppercase letter".to_string());
        }
        if self.policy.require_lowercase && !password.chars().any(char::is_lowercase) {
            violations.push("password must contain at least one lowercase letter".to_string());
        }
        if self.policy.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            violations.push("password must contain at least one digit".to_string());
        }
        if self.policy.require_special
            && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c))
        {
            violations.push("password must contain at least one special character".to_string());
        }

        if violations.is_empty() {
            PolicyValidationResult::passed()
        } else {
            PolicyValidationResult::failed(violations)
        }
    }
}
