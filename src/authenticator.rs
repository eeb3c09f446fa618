//! Authenticator records binding identifiers to verifiable secrets.
//!
//! An authenticator is the server-side record for one authentication factor of
//! one identifier: a common header (id, identifier, status, timestamps) plus
//! type-specific material. Each identifier holds at most one authenticator per
//! type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pki::Certificate;

/// Authenticator families supported by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorType {
    Password,
    PkiCert,
    HardwareToken,
    ApiKey,
}

impl AuthenticatorType {
    /// Wire form of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::PkiCert => "pki_cert",
            Self::HardwareToken => "hardware_token",
            Self::ApiKey => "api_key",
        }
    }

    /// Parse a type from its wire form.
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "password" => Some(Self::Password),
            "pki_cert" => Some(Self::PkiCert),
            "hardware_token" => Some(Self::HardwareToken),
            "api_key" => Some(Self::ApiKey),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuthenticatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticator lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorStatus {
    /// Usable for authentication.
    Active,
    /// Expired; unusable until renewed.
    Expired,
    /// Revoked; permanently unusable.
    Revoked,
    /// Locked after policy violations (e.g. too many failed attempts).
    Locked,
}

impl std::fmt::Display for AuthenticatorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Locked => "locked",
        };
        f.write_str(value)
    }
}

/// Type-specific authenticator payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticatorMaterial {
    Password {
        /// Opaque password hash. Never plaintext.
        password_hash: String,
        /// Number of failed authentication attempts since the last success.
        failed_attempts: u32,
        /// The record behaves as locked until this instant passes.
        locked_until: Option<DateTime<Utc>>,
    },
    PkiCert {
        /// Certificate subject distinguished name.
        subject_dn: String,
        /// Certificate serial number (hex).
        serial_number: String,
        /// SHA-256 digest over the DER-encoded certificate (hex).
        fingerprint: String,
    },
    HardwareToken,
    ApiKey,
}

/// An authenticator bound to an identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authenticator {
    /// Opaque unique id.
    pub id: String,
    /// The user or service identifier this authenticator belongs to.
    pub identifier: String,
    /// Lifecycle status.
    pub status: AuthenticatorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Expiration instant; `None` means the authenticator never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Type-specific payload.
    pub material: AuthenticatorMaterial,
}

impl Authenticator {
    /// Create a new active password authenticator.
    pub fn password(
        identifier: impl Into<String>,
        password_hash: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identifier: identifier.into(),
            status: AuthenticatorStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at,
            material: AuthenticatorMaterial::Password {
                password_hash: password_hash.into(),
                failed_attempts: 0,
                locked_until: None,
            },
        }
    }

    /// Create a new active PKI authenticator from a parsed certificate.
    ///
    /// The expiration equals the certificate's `notAfter`.
    pub fn pki(identifier: impl Into<String>, certificate: &Certificate) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identifier: identifier.into(),
            status: AuthenticatorStatus::Active,
            created_at: now,
            updated_at: now,
            expires_at: Some(certificate.not_after()),
            material: AuthenticatorMaterial::PkiCert {
                subject_dn: certificate.subject().to_string(),
                serial_number: certificate.serial_number().to_string(),
                fingerprint: certificate.fingerprint().to_string(),
            },
        }
    }

    /// The authenticator family of this record.
    pub fn kind(&self) -> AuthenticatorType {
        match self.material {
            AuthenticatorMaterial::Password { .. } => AuthenticatorType::Password,
            AuthenticatorMaterial::PkiCert { .. } => AuthenticatorType::PkiCert,
            AuthenticatorMaterial::HardwareToken => AuthenticatorType::HardwareToken,
            AuthenticatorMaterial::ApiKey => AuthenticatorType::ApiKey,
        }
    }

    /// Whether the authenticator has passed its expiration instant.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() > expires_at,
            None => false,
        }
    }

    /// Whether the authenticator is currently locked.
    pub fn is_locked(&self) -> bool {
        match self.locked_until() {
            Some(until) => Utc::now() < until,
            None => false,
        }
    }

    /// Whether the authenticator is usable: active status, not expired, not
    /// locked.
    pub fn is_active(&self) -> bool {
        self.status == AuthenticatorStatus::Active && !self.is_expired() && !self.is_locked()
    }

    /// The stored password hash, if this is a password authenticator.
    pub fn password_hash(&self) -> Option<&str> {
        match &self.material {
            AuthenticatorMaterial::Password { password_hash, .. } => Some(password_hash),
            _ => None,
        }
    }

    /// Failed attempts since the last success (password authenticators).
    pub fn failed_attempts(&self) -> u32 {
        match &self.material {
            AuthenticatorMaterial::Password {
                failed_attempts, ..
            } => *failed_attempts,
            _ => 0,
        }
    }

    /// The lockout instant, if one is set.
    pub fn locked_until(&self) -> Option<DateTime<Utc>> {
        match &self.material {
            AuthenticatorMaterial::Password { locked_until, .. } => *locked_until,
            _ => None,
        }
    }

    /// The certificate fingerprint, if this is a PKI authenticator.
    pub fn fingerprint(&self) -> Option<&str> {
        match &self.material {
            AuthenticatorMaterial::PkiCert { fingerprint, .. } => Some(fingerprint),
            _ => None,
        }
    }
}
