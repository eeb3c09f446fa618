//! Authenticator lifecycle management.
//!
//! The manager owns every status transition: creation with policy enforcement,
//! validation with sliding-window lockout, update with history reuse checks,
//! revocation, expiration, and renewal. Password hashing runs before any
//! storage lock is taken; only the commit happens under per-key exclusivity.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::authenticator::{
    Authenticator, AuthenticatorMaterial, AuthenticatorStatus, AuthenticatorType,
};
use crate::credentials::Credential;
use crate::errors::{AuthError, AuthenticatorError, Result};
use crate::hasher::PasswordHasher;
use crate::pki::Certificate;
use crate::policy::{PasswordPolicy, PasswordPolicyValidator};
use crate::security::constant_time_eq;
use crate::storage::AuthenticationStorage;

/// Manages authenticators for identifiers (one per type per identifier).
pub struct AuthenticatorManager<S: AuthenticationStorage> {
    storage: Arc<S>,
    hasher: PasswordHasher,
    policy: PasswordPolicy,
    validator: PasswordPolicyValidator,
}

impl<S: AuthenticationStorage> AuthenticatorManager<S> {
    /// Create a manager over the given storage, hasher, and policy.
    pub fn new(storage: Arc<S>, hasher: PasswordHasher, policy: PasswordPolicy) -> Result<Self> {
        let validator = PasswordPolicyValidator::new(policy.clone())?;
        Ok(Self {
            storage,
            hasher,
            policy,
            validator,
        })
    }

    /// The password policy enforced by this manager.
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// The storage backing this manager.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Create a new authenticator for the identifier.
    pub fn create(&self, identifier: &str, credential: &Credential) -> Result<Authenticator> {
        require_identifier(identifier)?;
        match credential {
            Credential::Password { password, .. } => {
                self.create_password(identifier, password.as_str())
            }
            Credential::Certificate { certificate, .. } => {
                self.create_pki(identifier, certificate)
            }
        }
    }

    fn create_password(&self, identifier: &str, password: &str) -> Result<Authenticator> {
        let validation = self.validator.validate(password);
        if !validation.valid {
            let violations = validation.violations.join("; ");
            warn!(
                "password validation failed for identifier {}: {}",
                identifier, violations
            );
            return Err(AuthenticatorError::PolicyViolation { violations }.into());
        }

        if self
            .storage
            .authenticator_exists(identifier, AuthenticatorType::Password)?
        {
            return Err(AuthenticatorError::AlreadyExists {
                identifier: identifier.to_string(),
                kind: AuthenticatorType::Password,
            }
            .into());
        }

        // Hashing is CPU-bound; run it before touching the record.
        let password_hash = self.hasher.hash(password)?;
        let expires_at = self.policy.expiry(Utc::now());

        let authenticator = Authenticator::password(identifier, password_hash.clone(), expires_at);
        self.storage.store_authenticator(authenticator.clone())?;
        self.storage
            .push_password_history(identifier, &password_hash)?;
        self.storage.reset_failed_attempts(identifier)?;
        self.storage.set_locked_until(identifier, None)?;

        info!("created password authenticator for identifier {}", identifier);
        Ok(authenticator)
    }

    fn create_pki(&self, identifier: &str, certificate: &Certificate) -> Result<Authenticator> {
        if self
            .storage
            .authenticator_exists(identifier, AuthenticatorType::PkiCert)?
        {
            return Err(AuthenticatorError::AlreadyExists {
                identifier: identifier.to_string(),
                kind: AuthenticatorType::PkiCert,
            }
            .into());
        }

        let authenticator = Authenticator::pki(identifier, certificate);
        self.storage.store_authenticator(authenticator.clone())?;

        info!(
            "created PKI authenticator for identifier {} (subject: {})",
            identifier,
            certificate.subject()
        );
        Ok(authenticator)
    }

    /// Validate a credential against the stored authenticator.
    ///
    /// Password failures are recorded and may transition the authenticator to
    /// LOCKED; a success resets attempt and lockout state.
    pub fn validate(&self, identifier: &str, credential: &Credential) -> Result<bool> {
        require_identifier(identifier)?;
        match credential {
            Credential::Password { password, .. } => {
                self.validate_password(identifier, password.as_str())
            }
            Credential::Certificate { certificate, .. } => {
                self.validate_pki(identifier, certificate)
            }
        }
    }

    fn validate_password(&self, identifier: &str, password: &str) -> Result<bool> {
        let Some(authenticator) = self.get(identifier, AuthenticatorType::Password)? else {
            warn!("no password authenticator found for identifier {}", identifier);
            return Ok(false);
        };

        if !authenticator.is_active() {
            warn!(
                "password authenticator is not active for identifier {}",
                identifier
            );
            return Ok(false);
        }

        let Some(hash) = authenticator.password_hash() else {
            return Ok(false);
        };

        // Verification runs outside the record lock.
        let matches = self.hasher.verify(password, hash);

        if matches {
            self.storage.reset_failed_attempts(identifier)?;
            self.storage.set_locked_until(identifier, None)?;
            self.storage.update_authenticator(
                identifier,
                AuthenticatorType::Password,
                &mut |authenticator| {
                    if let AuthenticatorMaterial::Password {
                        failed_attempts,
                        locked_until,
                        ..
                    } = &mut authenticator.material
                    {
                        *failed_attempts = 0;
                        *locked_until = None;
                    }
                },
            )?;
            debug!("password validation successful for identifier {}", identifier);
        } else {
            self.handle_failed_attempt(identifier)?;
            warn!("password validation failed for identifier {}", identifier);
        }

        Ok(matches)
    }

    fn handle_failed_attempt(&self, identifier: &str) -> Result<()> {
        let now = Utc::now();
        let count = self.storage.record_failed_attempt(identifier, now)?;

        let window_start =
            now - Duration::minutes(self.policy.lockout_window_minutes as i64);
        let recent = self
            .storage
            .failed_attempts_in_window(identifier, window_start)?;

        if recent.len() as u32 >= self.policy.max_failed_attempts {
            let locked_until =
                now + Duration::minutes(self.policy.lockout_duration_minutes as i64);
            self.storage
                .set_locked_until(identifier, Some(locked_until))?;
            self.storage.update_authenticator(
                identifier,
                AuthenticatorType::Password,
                &mut |authenticator| {
                    authenticator.status = AuthenticatorStatus::Locked;
                    authenticator.updated_at = now;
                    if let AuthenticatorMaterial::Password {
                        failed_attempts,
                        locked_until: lock,
                        ..
                    } = &mut authenticator.material
                    {
                        *failed_attempts = count;
                        *lock = Some(locked_until);
                    }
                },
            )?;
            warn!(
                "account locked for identifier {} after {} failed attempts",
                identifier,
                recent.len()
            );
        }

        Ok(())
    }

    fn validate_pki(&self, identifier: &str, certificate: &Certificate) -> Result<bool> {
        let Some(authenticator) = self.get(identifier, AuthenticatorType::PkiCert)? else {
            warn!("no PKI authenticator found for identifier {}", identifier);
            return Ok(false);
        };

        if !authenticator.is_active() {
            warn!("PKI authenticator is not active for identifier {}", identifier);
            return Ok(false);
        }

        let Some(stored) = authenticator.fingerprint() else {
            return Ok(false);
        };
        Ok(constant_time_eq(
            stored.as_bytes(),
            certificate.fingerprint().as_bytes(),
        ))
    }

    /// Replace a credential after validating the old one.
    ///
    /// The old-credential check runs the full validation rules and may lock
    /// the account; the new password must satisfy the policy and must not
    /// verify against any retained history entry.
    pub fn update(
        &self,
        identifier: &str,
        old_credential: &Credential,
        new_credential: &Credential,
    ) -> Result<Authenticator> {
        require_identifier(identifier)?;
        if !self.validate(identifier, old_credential)? {
            return Err(AuthenticatorError::OldCredentialInvalid.into());
        }

        match new_credential {
            Credential::Password { password, .. } => {
                self.update_password(identifier, password.as_str())
            }
            other => Err(AuthenticatorError::UnsupportedCredential {
                credential_type: other.credential_type().to_string(),
            }
            .into()),
        }
    }

    fn update_password(&self, identifier: &str, new_password: &str) -> Result<Authenticator> {
        let validation = self.validator.validate(new_password);
        if !validation.valid {
            return Err(AuthenticatorError::PolicyViolation {
                violations: validation.violations.join("; "),
            }
            .into());
        }

        for old_hash in self.storage.password_history(identifier)? {
            if self.hasher.verify(new_password, &old_hash) {
                return Err(AuthenticatorError::RecentlyUsed.into());
            }
        }

        // Hash before the commit; the record lock is held only below.
        let new_hash = self.hasher.hash(new_password)?;
        let now = Utc::now();
        let expires_at = self.policy.expiry(now);

        let updated = self.storage.update_authenticator(
            identifier,
            AuthenticatorType::Password,
            &mut |authenticator| {
                authenticator.status = AuthenticatorStatus::Active;
                authenticator.updated_at = now;
                authenticator.expires_at = expires_at;
                if let AuthenticatorMaterial::Password {
                    password_hash,
                    failed_attempts,
                    locked_until,
                } = &mut authenticator.material
                {
                    *password_hash = new_hash.clone();
                    *failed_attempts = 0;
                    *locked_until = None;
                }
            },
        )?;
        if !updated {
            return Err(AuthenticatorError::NotFound {
                identifier: identifier.to_string(),
                kind: AuthenticatorType::Password,
            }
            .into());
        }

        self.storage.push_password_history(identifier, &new_hash)?;
        self.storage
            .trim_password_history(identifier, self.policy.password_history_size)?;
        self.storage.reset_failed_attempts(identifier)?;
        self.storage.set_locked_until(identifier, None)?;

        info!("updated password authenticator for identifier {}", identifier);
        self.storage
            .authenticator(identifier, AuthenticatorType::Password)?
            .ok_or_else(|| {
                AuthError::from(AuthenticatorError::NotFound {
                    identifier: identifier.to_string(),
                    kind: AuthenticatorType::Password,
                })
            })
    }

    /// Revoke an authenticator. Revocation is permanent.
    pub fn revoke(&self, identifier: &str, kind: AuthenticatorType) -> Result<()> {
        require_identifier(identifier)?;
        let now = Utc::now();
        let updated = self
            .storage
            .update_authenticator(identifier, kind, &mut |authenticator| {
                authenticator.status = AuthenticatorStatus::Revoked;
                authenticator.updated_at = now;
            })?;
        if !updated {
            return Err(AuthenticatorError::NotFound {
                identifier: identifier.to_string(),
                kind,
            }
            .into());
        }
        info!("revoked {} authenticator for identifier {}", kind, identifier);
        Ok(())
    }

    /// Force-expire an authenticator.
    pub fn expire(&self, identifier: &str, kind: AuthenticatorType) -> Result<()> {
        require_identifier(identifier)?;
        let now = Utc::now();
        let updated = self
            .storage
            .update_authenticator(identifier, kind, &mut |authenticator| {
                authenticator.status = AuthenticatorStatus::Expired;
                authenticator.expires_at = Some(now);
                authenticator.updated_at = now;
            })?;
        if !updated {
            return Err(AuthenticatorError::NotFound {
                identifier: identifier.to_string(),
                kind,
            }
            .into());
        }
        info!("expired {} authenticator for identifier {}", kind, identifier);
        Ok(())
    }

    /// Renew an expired authenticator with a fresh credential.
    pub fn renew(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
        credential: &Credential,
    ) -> Result<Authenticator> {
        require_identifier(identifier)?;
        let authenticator =
            self.get(identifier, kind)?
                .ok_or_else(|| AuthenticatorError::NotFound {
                    identifier: identifier.to_string(),
                    kind,
                })?;
        if authenticator.status != AuthenticatorStatus::Expired {
            return Err(AuthenticatorError::NotExpired.into());
        }

        match credential {
            Credential::Password { password, .. } => {
                self.update_password(identifier, password.as_str())
            }
            Credential::Certificate { certificate, .. } => {
                self.renew_pki(identifier, certificate)
            }
        }
    }

    fn renew_pki(&self, identifier: &str, certificate: &Certificate) -> Result<Authenticator> {
        let now = Utc::now();
        let subject_dn = certificate.subject().to_string();
        let serial_number = certificate.serial_number().to_string();
        let new_fingerprint = certificate.fingerprint().to_string();
        let not_after = certificate.not_after();

        let updated = self.storage.update_authenticator(
            identifier,
            AuthenticatorType::PkiCert,
            &mut |authenticator| {
                authenticator.status = AuthenticatorStatus::Active;
                authenticator.updated_at = now;
                authenticator.expires_at = Some(not_after);
                if let AuthenticatorMaterial::PkiCert {
                    subject_dn: subject,
                    serial_number: serial,
                    fingerprint,
                } = &mut authenticator.material
                {
                    *subject = subject_dn.clone();
                    *serial = serial_number.clone();
                    *fingerprint = new_fingerprint.clone();
                }
            },
        )?;
        if !updated {
            return Err(AuthenticatorError::NotFound {
                identifier: identifier.to_string(),
                kind: AuthenticatorType::PkiCert,
            }
            .into());
        }

        info!("renewed PKI authenticator for identifier {}", identifier);
        self.storage
            .authenticator(identifier, AuthenticatorType::PkiCert)?
            .ok_or_else(|| {
                AuthError::from(AuthenticatorError::NotFound {
                    identifier: identifier.to_string(),
                    kind: AuthenticatorType::PkiCert,
                })
            })
    }

    /// List all authenticators for an identifier.
    pub fn list(&self, identifier: &str) -> Result<Vec<Authenticator>> {
        require_identifier(identifier)?;
        Ok(self.storage.authenticators(identifier)?)
    }

    /// Get one authenticator, normalizing an elapsed lockout on read.
    ///
    /// When the lockout instant has passed, the effective state returns to
    /// ACTIVE without an explicit unlock call, and the lockout and attempt
    /// timestamps are cleared.
    pub fn get(
        &self,
        identifier: &str,
        kind: AuthenticatorType,
    ) -> Result<Option<Authenticator>> {
        require_identifier(identifier)?;
        let Some(authenticator) = self.storage.authenticator(identifier, kind)? else {
            return Ok(None);
        };
        Ok(Some(self.normalize_elapsed_lockout(identifier, authenticator)?))
    }

    fn normalize_elapsed_lockout(
        &self,
        identifier: &str,
        authenticator: Authenticator,
    ) -> Result<Authenticator> {
        let now = Utc::now();
        let elapsed = matches!(authenticator.locked_until(), Some(until) if now > until);
        if !elapsed {
            return Ok(authenticator);
        }

        debug!("lockout elapsed for identifier {}", identifier);
        let kind = authenticator.kind();
        self.storage
            .update_authenticator(identifier, kind, &mut |authenticator| {
                if authenticator.status == AuthenticatorStatus::Locked {
                    authenticator.status = AuthenticatorStatus::Active;
                }
                authenticator.updated_at = now;
                if let AuthenticatorMaterial::Password {
                    failed_attempts,
                    locked_until,
                    ..
                } = &mut authenticator.material
                {
                    *failed_attempts = 0;
                    *locked_until = None;
                }
            })?;
        self.storage.set_locked_until(identifier, None)?;
        self.storage.reset_failed_attempts(identifier)?;

        Ok(self
            .storage
            .authenticator(identifier, kind)?
            .unwrap_or(authenticator))
    }

    /// Whether the authenticator has expired.
    pub fn is_expired(&self, identifier: &str, kind: AuthenticatorType) -> Result<bool> {
        let authenticator =
            self.get(identifier, kind)?
                .ok_or_else(|| AuthenticatorError::NotFound {
                    identifier: identifier.to_string(),
                    kind,
                })?;
        Ok(authenticator.is_expired())
    }
}

fn require_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(AuthError::validation("identifier cannot be empty"));
    }
    Ok(())
}
