//! Error types for the access-management core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authenticator::AuthenticatorType;

/// Result type alias for the access-management core.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Main error type for the access-management core.
///
/// These are operational faults signaled by management and storage operations.
/// Authentication *outcomes* (wrong password, revoked authenticator, ...) are
/// not errors; they travel inside [`crate::providers::AuthenticationResult`].
#[derive(Error, Debug)]
pub enum AuthError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invalid arguments at public entry points
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Cryptography errors
    #[error("Cryptography error: {message}")]
    Crypto { message: String },

    /// Certificate parsing and handling errors
    #[error("Certificate error: {message}")]
    Certificate { message: String },

    /// Authenticator lifecycle errors
    #[error("Authenticator error: {0}")]
    Authenticator(#[from] AuthenticatorError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a new certificate error
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }
}

/// Authenticator lifecycle errors raised by the manager.
#[derive(Error, Debug)]
pub enum AuthenticatorError {
    #[error("no {kind} authenticator found for identifier '{identifier}'")]
    NotFound {
        identifier: String,
        kind: AuthenticatorType,
    },

    #[error("{kind} authenticator already exists for identifier '{identifier}'")]
    AlreadyExists {
        identifier: String,
        kind: AuthenticatorType,
    },

    #[error("password policy violation: {violations}")]
    PolicyViolation { violations: String },

    #[error("password has been used recently and cannot be reused")]
    RecentlyUsed,

    #[error("old credential validation failed")]
    OldCredentialInvalid,

    #[error("only expired authenticators can be renewed")]
    NotExpired,

    #[error("unsupported credential type '{credential_type}'")]
    UnsupportedCredential { credential_type: String },
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("concurrent session limit exceeded for user '{user_id}'")]
    ConcurrentLimitExceeded { user_id: String },

    #[error("session '{session_id}' not found")]
    NotFound { session_id: String },
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Storage backend not available")]
    BackendUnavailable,
}

impl StorageError {
    /// Create a new connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a new operation failed error
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

/// Error codes surfaced inside authentication outcomes at the crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientFactors,
    IdentifierMismatch,
    UnsupportedCredentialType,
    PolicyNotSatisfied,
    AuthenticatorNotFound,
    AuthenticatorRevoked,
    AuthenticatorLocked,
    AuthenticatorExpired,
    InvalidPassword,
    CertificateInvalid,
    InvalidCredentialType,
    ConcurrentLimitExceeded,
}

impl ErrorCode {
    /// Wire form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientFactors => "INSUFFICIENT_FACTORS",
            Self::IdentifierMismatch => "IDENTIFIER_MISMATCH",
            Self::UnsupportedCredentialType => "UNSUPPORTED_CREDENTIAL_TYPE",
            Self::PolicyNotSatisfied => "POLICY_NOT_SATISFIED",
            Self::AuthenticatorNotFound => "AUTHENTICATOR_NOT_FOUND",
            Self::AuthenticatorRevoked => "AUTHENTICATOR_REVOKED",
            Self::AuthenticatorLocked => "AUTHENTICATOR_LOCKED",
            Self::AuthenticatorExpired => "AUTHENTICATOR_EXPIRED",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::CertificateInvalid => "CERTIFICATE_INVALID",
            Self::InvalidCredentialType => "INVALID_CREDENTIAL_TYPE",
            Self::ConcurrentLimitExceeded => "CONCURRENT_LIMIT_EXCEEDED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_form() {
        assert_eq!(
            ErrorCode::AuthenticatorLocked.as_str(),
            "AUTHENTICATOR_LOCKED"
        );
        assert_eq!(
            ErrorCode::ConcurrentLimitExceeded.to_string(),
            "CONCURRENT_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_error_helpers() {
        let err = AuthError::validation("identifier cannot be empty");
        assert!(matches!(err, AuthError::Validation { .. }));
        assert!(err.to_string().contains("identifier cannot be empty"));
    }
}
