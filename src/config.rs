//! Runtime configuration for the access-management core.
//!
//! Values start from NIST-aligned defaults and may be overridden through the
//! process environment. The environment key for an option is its dotted name
//! uppercased with dots replaced by underscores, e.g.
//! `auth.max.login.attempts` -> `AUTH_MAX_LOGIN_ATTEMPTS`.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Configuration for authenticator and session policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Maximum session age in minutes before the session expires.
    pub session_timeout_minutes: u64,
    /// Maximum idle time in seconds before the session expires.
    pub inactivity_timeout_seconds: u64,
    /// Maximum age of the last re-authentication in seconds before a
    /// re-authentication demand is raised.
    pub reauth_timeout_seconds: u64,
    /// Maximum number of concurrently active sessions per user.
    pub max_concurrent_sessions: u32,
    /// Failed-attempt threshold for account lockout.
    pub max_login_attempts: u32,
    /// Lockout duration in minutes once the threshold is hit.
    pub account_lockout_minutes: u64,
    /// Minimum password length.
    pub password_min_length: usize,
    /// Whether passwords must contain all four character classes.
    pub require_password_complexity: bool,
    /// Password expiration in days (0 = never).
    pub password_expiration_days: u32,
    /// Number of prior password hashes retained for reuse checks.
    pub password_history_size: usize,
    /// Token lifetime in minutes, passed through to token issuers.
    pub token_expiration_minutes: u64,
    /// Whether audit logging is enabled, passed through to audit sinks.
    pub enable_audit_logging: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_timeout_minutes: 30,
            inactivity_timeout_seconds: 1800,
            reauth_timeout_seconds: 3600,
            max_concurrent_sessions: 5,
            max_login_attempts: 3,
            account_lockout_minutes: 15,
            password_min_length: 12,
            require_password_complexity: true,
            password_expiration_days: 90,
            password_history_size: 5,
            token_expiration_minutes: 60,
            enable_audit_logging: true,
        }
    }
}

impl AuthConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with defaults overridden from the environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            session_timeout_minutes: env_value(
                "auth.session.timeout.minutes",
                defaults.session_timeout_minutes,
            ),
            inactivity_timeout_seconds: env_value(
                "auth.session.inactivity.timeout.seconds",
                defaults.inactivity_timeout_seconds,
            ),
            reauth_timeout_seconds: env_value(
                "auth.session.reauth.timeout.seconds",
                defaults.reauth_timeout_seconds,
            ),
            max_concurrent_sessions: env_value(
                "auth.session.max.concurrent",
                defaults.max_concurrent_sessions,
            ),
            max_login_attempts: env_value("auth.max.login.attempts", defaults.max_login_attempts),
            account_lockout_minutes: env_value(
                "auth.account.lockout.minutes",
                defaults.account_lockout_minutes,
            ),
            password_min_length: env_value(
                "auth.password.min.length",
                defaults.password_min_length,
            ),
            require_password_complexity: env_value(
                "auth.password.require.complexity",
                defaults.require_password_complexity,
            ),
            password_expiration_days: env_value(
                "auth.password.expiration.days",
                defaults.password_expiration_days,
            ),
            password_history_size: env_value(
                "auth.password.history.size",
                defaults.password_history_size,
            ),
            token_expiration_minutes: env_value(
                "auth.token.expiration.minutes",
                defaults.token_expiration_minutes,
            ),
            enable_audit_logging: env_value(
                "auth.audit.logging.enabled",
                defaults.enable_audit_logging,
            ),
        }
    }
}

/// Environment key for a dotted option name.
fn env_key(property: &str) -> String {
    property.replace('.', "_").to_uppercase()
}

fn env_value<T: FromStr + Copy>(property: &str, default: T) -> T {
    match env::var(env_key(property)) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(
                "invalid value '{}' for {}, using default",
                raw,
                env_key(property)
            );
            default
        }),
        Err(_) => default,
    }
}
