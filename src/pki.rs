//! X.509 certificate handling: parsing, trust store, and validation.
//!
//! Validation runs three cumulative phases (format, validity period, trust
//! chain) and stops at the first phase that records violations. An empty trust
//! store passes the trust-chain phase; this is the explicit escape hatch for
//! test and bootstrap setups.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::parse_x509_certificate;

use crate::errors::{AuthError, Result};

/// A parsed X.509 certificate.
///
/// Owns the DER encoding and the fields the core needs, so no lifetime ties a
/// certificate to its input buffer. Certificates are immutable; stores keep
/// their own copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial_number: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    fingerprint: String,
}

impl Certificate {
    /// Parse a certificate from its DER encoding.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        let (subject, issuer, serial_number, not_before, not_after) = {
            let (_, cert) = parse_x509_certificate(&der)
                .map_err(|_| AuthError::certificate("failed to parse DER certificate"))?;
            let not_before =
                DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
                    .ok_or_else(|| AuthError::certificate("invalid notBefore timestamp"))?;
            let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
                .ok_or_else(|| AuthError::certificate("invalid notAfter timestamp"))?;
            (
                cert.subject().to_string(),
                cert.issuer().to_string(),
                hex::encode(cert.serial.to_bytes_be()),
                not_before,
                not_after,
            )
        };

        let fingerprint = hex::encode(Sha256::digest(&der));

        Ok(Self {
            der,
            subject,
            issuer,
            serial_number,
            not_before,
            not_after,
            fingerprint,
        })
    }

    /// The DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Serial number in lowercase hex.
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// SHA-256 digest over the DER encoding, lowercase hex.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether the validity window contains the current instant.
    pub fn is_currently_valid(&self) -> bool {
        let now = Utc::now();
        self.not_before <= now && now <= self.not_after
    }

    /// Whether `issuer`'s public key verifies this certificate's signature.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> bool {
        let Ok((_, cert)) = parse_x509_certificate(&self.der) else {
            return false;
        };
        let Ok((_, issuer_cert)) = parse_x509_certificate(&issuer.der) else {
            return false;
        };
        cert.verify_signature(Some(issuer_cert.public_key())).is_ok()
    }
}

/// In-memory store of trusted CA certificates and user certificates.
#[derive(Debug, Default)]
pub struct CertificateStore {
    trusted: DashMap<String, Certificate>,
    user: DashMap<String, Certificate>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted CA certificate under an alias.
    pub fn add_trusted_certificate(
        &self,
        alias: impl Into<String>,
        certificate: Certificate,
    ) -> Result<()> {
        let alias = alias.into();
        if alias.trim().is_empty() {
            return Err(AuthError::validation("certificate alias cannot be empty"));
        }
        debug!("added trusted certificate with alias {}", alias);
        self.trusted.insert(alias, certificate);
        Ok(())
    }

    /// Get a trusted CA certificate by alias.
    pub fn trusted_certificate(&self, alias: &str) -> Option<Certificate> {
        self.trusted.get(alias).map(|entry| entry.value().clone())
    }

    /// Remove a trusted CA certificate, returning it if present.
    pub fn remove_trusted_certificate(&self, alias: &str) -> Option<Certificate> {
        self.trusted.remove(alias).map(|(_, certificate)| certificate)
    }

    pub fn has_trusted_certificate(&self, alias: &str) -> bool {
        self.trusted.contains_key(alias)
    }

    /// Snapshot of all trusted CA certificates.
    pub fn trusted_certificates(&self) -> Vec<Certificate> {
        self.trusted
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn trusted_certificate_count(&self) -> usize {
        self.trusted.len()
    }

    /// Add a user certificate keyed by identifier.
    pub fn add_user_certificate(
        &self,
        identifier: impl Into<String>,
        certificate: Certificate,
    ) -> Result<()> {
        let identifier = identifier.into();
        if identifier.trim().is_empty() {
            return Err(AuthError::validation("identifier cannot be empty"));
        }
        debug!("added user certificate for identifier {}", identifier);
        self.user.insert(identifier, certificate);
        Ok(())
    }

    /// Get a user certificate by identifier.
    pub fn user_certificate(&self, identifier: &str) -> Option<Certificate> {
        self.user.get(identifier).map(|entry| entry.value().clone())
    }

    /// Remove a user certificate, returning it if present.
    pub fn remove_user_certificate(&self, identifier: &str) -> Option<Certificate> {
        self.user.remove(identifier).map(|(_, certificate)| certificate)
    }

    pub fn has_user_certificate(&self, identifier: &str) -> bool {
        self.user.contains_key(identifier)
    }

    pub fn user_certificate_count(&self) -> usize {
        self.user.len()
    }

    pub fn clear_trusted_certificates(&self) {
        self.trusted.clear();
    }

    pub fn clear_user_certificates(&self) {
        self.user.clear();
    }

    pub fn clear_all(&self) {
        self.clear_trusted_certificates();
        self.clear_user_certificates();
    }
}

/// Outcome of certificate validation.
#[derive(Debug, Clone)]
pub struct CertificateValidationResult {
    pub valid: bool,
    pub message: String,
    pub violations: Vec<String>,
}

/// Validates certificates against format, validity, and the trust store.
pub struct CertificateValidator {
    store: std::sync::Arc<CertificateStore>,
}

impl CertificateValidator {
    pub fn new(store: std::sync::Arc<CertificateStore>) -> Self {
        Self { store }
    }

    /// The trust store consulted by this validator.
    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// Validate a certificate. Phases run in order and validation stops at the
    /// first phase that records violations.
    pub fn validate(&self, certificate: &Certificate) -> CertificateValidationResult {
        let mut violations = Vec::new();

        self.check_format(certificate, &mut violations);
        if !violations.is_empty() {
            return CertificateValidationResult {
                valid: false,
                message: "certificate format validation failed".to_string(),
                violations,
            };
        }

        self.check_validity(certificate, &mut violations);
        if !violations.is_empty() {
            return CertificateValidationResult {
                valid: false,
                message: "certificate validity period validation failed".to_string(),
                violations,
            };
        }

        self.check_trust_chain(certificate, &mut violations);
        if !violations.is_empty() {
            return CertificateValidationResult {
                valid: false,
                message: "certificate trust chain validation failed".to_string(),
                violations,
            };
        }

        CertificateValidationResult {
            valid: true,
            message: "certificate is valid".to_string(),
            violations,
        }
    }

    fn check_format(&self, certificate: &Certificate, violations: &mut Vec<String>) {
        if certificate.subject().trim().is_empty() {
            violations.push("certificate subject is empty".to_string());
        }
        if certificate.issuer().trim().is_empty() {
            violations.push("certificate issuer is empty".to_string());
        }
        if certificate.serial_number().trim().is_empty() {
            violations.push("certificate serial number is empty".to_string());
        }
    }

    fn check_validity(&self, certificate: &Certificate, violations: &mut Vec<String>) {
        let now = Utc::now();
        if now < certificate.not_before() {
            violations.push(format!(
                "certificate is not yet valid (notBefore: {})",
                certificate.not_before()
            ));
        }
        if now > certificate.not_after() {
            violations.push(format!(
                "certificate has expired (notAfter: {})",
                certificate.not_after()
            ));
        }
    }

    fn check_trust_chain(&self, certificate: &Certificate, violations: &mut Vec<String>) {
        if self.store.trusted_certificate_count() == 0 {
            debug!("no trusted certificates in store, skipping trust chain validation");
            return;
        }

        for trusted in self.store.trusted_certificates() {
            if trusted.subject() == certificate.issuer()
                && certificate.verify_signed_by(&trusted)
            {
                debug!("certificate trust chain validation passed");
                return;
            }
        }

        violations.push(format!(
            "certificate issuer is not trusted: {}",
            certificate.issuer()
        ));
    }
}
