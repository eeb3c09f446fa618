//! Authentication providers and outcome records.
//!
//! A provider turns one credential into an [`AuthenticationResult`]. Failed
//! authentication is an outcome, not an error: the result carries one of the
//! boundary [`ErrorCode`]s. Operational faults (storage failures, invalid
//! arguments) are signaled through [`crate::errors::AuthError`] instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::authenticator::{AuthenticatorStatus, AuthenticatorType};
use crate::credentials::Credential;
use crate::errors::{ErrorCode, Result};
use crate::manager::AuthenticatorManager;
use crate::pki::CertificateValidator;
use crate::principal::Principal;
use crate::storage::AuthenticationStorage;

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationResult {
    pub success: bool,
    /// The authenticated subject, on success.
    pub principal: Option<Principal>,
    /// Boundary error code, on failure.
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Source address of the attempt, when the caller supplies one.
    pub source_address: Option<String>,
}

impl AuthenticationResult {
    /// A successful outcome carrying the authenticated principal.
    pub fn success(principal: Principal) -> Self {
        Self {
            success: true,
            principal: Some(principal),
            error_code: None,
            error_message: None,
            timestamp: Utc::now(),
            source_address: None,
        }
    }

    /// A failed outcome carrying a boundary code and message.
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            principal: None,
            error_code: Some(code),
            error_message: Some(message.into()),
            timestamp: Utc::now(),
            source_address: None,
        }
    }

    /// Attach the source address of the attempt.
    pub fn with_source_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }
}

/// A mechanism that can authenticate one family of credentials.
pub trait AuthenticationProvider: Send + Sync {
    /// Authenticate the credential. Consumes it; sensitive material is
    /// cleared in the success-and-failure common path.
    fn authenticate(&self, credential: Credential) -> Result<AuthenticationResult>;

    /// Whether this provider can authenticate the given credential.
    fn supports(&self, credential: &Credential) -> bool;

    /// Provider name, for logs.
    fn name(&self) -> &'static str;
}

/// Password authentication against the authenticator manager.
///
/// Status checks run in a fixed order so the most specific failure code wins:
/// not found, revoked, locked, expired, then the password itself. The actual
/// verification goes through the manager, which records failed attempts and
/// applies the lockout policy.
pub struct PasswordAuthenticationProvider<S: AuthenticationStorage> {
    manager: Arc<AuthenticatorManager<S>>,
}

impl<S: AuthenticationStorage> PasswordAuthenticationProvider<S> {
    pub fn new(manager: Arc<AuthenticatorManager<S>>) -> Self {
        Self { manager }
    }

    fn try_authenticate(&self, credential: &Credential) -> Result<AuthenticationResult> {
        let Credential::Password { identifier, .. } = credential else {
            return Ok(AuthenticationResult::failure(
                ErrorCode::InvalidCredentialType,
                format!(
                    "expected a password credential, got '{}'",
                    credential.credential_type()
                ),
            ));
        };

        debug!("attempting password authentication for identifier {}", identifier);

        let Some(authenticator) = self
            .manager
            .get(identifier, AuthenticatorType::Password)?
        else {
            warn!("no password authenticator found for identifier {}", identifier);
            return Ok(AuthenticationResult::failure(
                ErrorCode::AuthenticatorNotFound,
                "no password authenticator found for identifier",
            ));
        };

        if authenticator.status == AuthenticatorStatus::Revoked {
            warn!("authentication attempted with revoked authenticator: {}", identifier);
            return Ok(AuthenticationResult::failure(
                ErrorCode::AuthenticatorRevoked,
                "authenticator has been revoked",
            ));
        }

        if authenticator.is_locked() {
            warn!("authentication attempted with locked authenticator: {}", identifier);
            return Ok(AuthenticationResult::failure(
                ErrorCode::AuthenticatorLocked,
                "account is locked due to too many failed attempts",
            ));
        }

        if authenticator.is_expired() {
            warn!("authentication attempted with expired authenticator: {}", identifier);
            return Ok(AuthenticationResult::failure(
                ErrorCode::AuthenticatorExpired,
                "password has expired and must be changed",
            ));
        }

        if self.manager.validate(identifier, credential)? {
            info!("password authentication successful for identifier {}", identifier);
            Ok(AuthenticationResult::success(Principal::new(
                identifier.as_str(),
                identifier.as_str(),
                "password",
            )))
        } else {
            warn!("password authentication failed for identifier {}", identifier);
            Ok(AuthenticationResult::failure(
                ErrorCode::InvalidPassword,
                "invalid password",
            ))
        }
    }
}

impl<S: AuthenticationStorage> AuthenticationProvider for PasswordAuthenticationProvider<S> {
    fn authenticate(&self, credential: Credential) -> Result<AuthenticationResult> {
        let mut credential = credential;
        let outcome = self.try_authenticate(&credential);
        credential.clear();
        outcome
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Password { .. })
    }

    fn name(&self) -> &'static str {
        "password"
    }
}

/// PKI certificate authentication against the certificate validator.
pub struct PkiAuthenticationProvider {
    validator: CertificateValidator,
}

impl PkiAuthenticationProvider {
    pub fn new(validator: CertificateValidator) -> Self {
        Self { validator }
    }

    /// The certificate validator used by this provider.
    pub fn validator(&self) -> &CertificateValidator {
        &self.validator
    }

    fn try_authenticate(&self, credential: &Credential) -> Result<AuthenticationResult> {
        let Credential::Certificate {
            identifier,
            certificate,
        } = credential
        else {
            return Ok(AuthenticationResult::failure(
                ErrorCode::InvalidCredentialType,
                format!(
                    "expected a certificate credential, got '{}'",
                    credential.credential_type()
                ),
            ));
        };

        debug!("attempting PKI authentication for identifier {}", identifier);

        let validation = self.validator.validate(certificate);
        if !validation.valid {
            warn!(
                "certificate validation failed for identifier {}: {}",
                identifier, validation.message
            );
            return Ok(AuthenticationResult::failure(
                ErrorCode::CertificateInvalid,
                format!("certificate validation failed: {}", validation.message),
            ));
        }

        info!(
            "PKI authentication successful for identifier {} (subject: {})",
            identifier,
            certificate.subject()
        );
        Ok(AuthenticationResult::success(Principal::new(
            identifier.as_str(),
            certificate.subject(),
            "pki_cert",
        )))
    }
}

impl AuthenticationProvider for PkiAuthenticationProvider {
    fn authenticate(&self, credential: Credential) -> Result<AuthenticationResult> {
        let mut credential = credential;
        let outcome = self.try_authenticate(&credential);
        credential.clear();
        outcome
    }

    fn supports(&self, credential: &Credential) -> bool {
        matches!(credential, Credential::Certificate { .. })
    }

    fn name(&self) -> &'static str {
        "pki_cert"
    }
}
