//! Credential types presented by clients during authentication.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::authenticator::AuthenticatorType;
use crate::pki::Certificate;

/// A password buffer that is zeroized when cleared or dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero the buffer in place.
    pub fn clear(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(****)")
    }
}

impl From<String> for SecureString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecureString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Client-presented material proving possession of an authenticator.
#[derive(Debug, Clone)]
pub enum Credential {
    /// A password for an identifier.
    Password {
        identifier: String,
        password: SecureString,
    },

    /// An X.509 certificate for an identifier.
    Certificate {
        identifier: String,
        certificate: Certificate,
    },
}

impl Credential {
    /// Create a password credential.
    pub fn password(identifier: impl Into<String>, password: impl Into<SecureString>) -> Self {
        Self::Password {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Create a certificate credential.
    pub fn certificate(identifier: impl Into<String>, certificate: Certificate) -> Self {
        Self::Certificate {
            identifier: identifier.into(),
            certificate,
        }
    }

    /// The identifier this credential claims.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Password { identifier, .. } => identifier,
            Self::Certificate { identifier, .. } => identifier,
        }
    }

    /// The credential type as a string.
    pub fn credential_type(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::Certificate { .. } => "pki_cert",
        }
    }

    /// The authenticator family this credential targets.
    pub fn authenticator_type(&self) -> AuthenticatorType {
        match self {
            Self::Password { .. } => AuthenticatorType::Password,
            Self::Certificate { .. } => AuthenticatorType::PkiCert,
        }
    }

    /// Validate the credential's own shape (not its correctness).
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Password { password, .. } => !password.is_empty(),
            Self::Certificate { .. } => true,
        }
    }

    /// Clear sensitive material from memory.
    ///
    /// Providers call this in the success-and-failure common path; the secret
    /// buffer is also zeroized on drop.
    pub fn clear(&mut self) {
        if let Self::Password { password, .. } = self {
            password.clear();
        }
    }

    /// A representation safe for logging (masks sensitive data).
    pub fn safe_display(&self) -> String {
        match self {
            Self::Password { identifier, .. } => format!("Password(identifier: {identifier})"),
            Self::Certificate {
                identifier,
                certificate,
            } => format!(
                "Certificate(identifier: {identifier}, subject: {})",
                certificate.subject()
            ),
        }
    }
}
