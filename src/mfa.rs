//! Multi-factor authentication policy and coordination.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::authenticator::AuthenticatorType;
use crate::credentials::Credential;
use crate::errors::{AuthError, ErrorCode, Result};
use crate::principal::Principal;
use crate::providers::{AuthenticationProvider, AuthenticationResult};

/// Multi-factor authentication requirements for a class of accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaPolicy {
    /// Whether multiple factors are mandatory.
    pub mfa_required: bool,
    /// Minimum number of distinct satisfied factor types. At least 1; at
    /// least 2 when MFA is required.
    pub minimum_factors: usize,
    /// Factor types that must all be satisfied.
    pub required_types: HashSet<AuthenticatorType>,
    /// Factor types accepted at all. Empty means any type is allowed.
    pub allowed_types: HashSet<AuthenticatorType>,
    /// Whether this policy governs a privileged account.
    pub privileged_account: bool,
}

impl Default for MfaPolicy {
    fn default() -> Self {
        Self {
            mfa_required: false,
            minimum_factors: 1,
            required_types: HashSet::new(),
            allowed_types: HashSet::new(),
            privileged_account: false,
        }
    }
}

impl MfaPolicy {
    /// Policy for privileged accounts: MFA mandatory with two factors.
    pub fn privileged() -> Self {
        Self {
            mfa_required: true,
            minimum_factors: 2,
            privileged_account: true,
            ..Self::default()
        }
    }

    /// Check the policy's own invariants.
    pub fn validate(&self) -> Result<()> {
        if self.minimum_factors < 1 {
            return Err(AuthError::config("minimum factors must be at least 1"));
        }
        if self.mfa_required && self.minimum_factors < 2 {
            return Err(AuthError::config(
                "multi-factor authentication requires at least 2 factors",
            ));
        }
        if !self.allowed_types.is_empty()
            && !self.required_types.is_subset(&self.allowed_types)
        {
            return Err(AuthError::config(
                "required factor types must be a subset of allowed types",
            ));
        }
        Ok(())
    }

    /// Whether the factor type is accepted under this policy.
    pub fn is_type_allowed(&self, kind: AuthenticatorType) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.contains(&kind)
    }

    /// Whether the factor type is mandatory under this policy.
    pub fn is_type_required(&self, kind: AuthenticatorType) -> bool {
        self.required_types.contains(&kind)
    }
}

/// Coordinates providers to authenticate a set of credentials under an MFA
/// policy.
pub struct MultiFactorAuthenticator {
    providers: HashMap<AuthenticatorType, Arc<dyn AuthenticationProvider>>,
    policy: MfaPolicy,
}

impl MultiFactorAuthenticator {
    /// Create a coordinator for the given policy.
    pub fn new(policy: MfaPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            providers: HashMap::new(),
            policy,
        })
    }

    /// Register the provider responsible for one factor type.
    pub fn register_provider(
        &mut self,
        kind: AuthenticatorType,
        provider: Arc<dyn AuthenticationProvider>,
    ) {
        debug!("registered authentication provider for type {}", kind);
        self.providers.insert(kind, provider);
    }

    /// The MFA policy enforced by this coordinator.
    pub fn policy(&self) -> &MfaPolicy {
        &self.policy
    }

    /// Authenticate an ordered list of credentials.
    ///
    /// All credentials must claim one identifier. Each dispatches to the
    /// provider supporting its type; the first provider failure aborts with
    /// that failure surfaced unchanged. After all providers succeed the
    /// satisfied types are checked against the policy.
    pub fn authenticate(&self, credentials: Vec<Credential>) -> Result<AuthenticationResult> {
        if credentials.is_empty() {
            return Err(AuthError::validation("credentials cannot be empty"));
        }

        debug!("attempting MFA authentication with {} credentials", credentials.len());

        let identifier = credentials[0].identifier().to_string();
        if credentials
            .iter()
            .any(|credential| credential.identifier() != identifier)
        {
            warn!("MFA authentication failed: credentials have different identifiers");
            return Ok(AuthenticationResult::failure(
                ErrorCode::IdentifierMismatch,
                "all credentials must be for the same identifier",
            ));
        }

        if self.policy.mfa_required && credentials.len() < self.policy.minimum_factors {
            warn!(
                "MFA authentication failed: insufficient factors (required: {}, provided: {})",
                self.policy.minimum_factors,
                credentials.len()
            );
            return Ok(AuthenticationResult::failure(
                ErrorCode::InsufficientFactors,
                format!(
                    "multi-factor authentication requires at least {} factors",
                    self.policy.minimum_factors
                ),
            ));
        }

        let mut satisfied: HashSet<AuthenticatorType> = HashSet::new();
        let mut first_success: Option<AuthenticationResult> = None;

        for credential in credentials {
            let kind = credential.authenticator_type();
            let Some(provider) = self.find_provider(&credential) else {
                warn!(
                    "no provider registered for credential type '{}'",
                    credential.credential_type()
                );
                return Ok(AuthenticationResult::failure(
                    ErrorCode::UnsupportedCredentialType,
                    format!(
                        "no provider registered for credential type '{}'",
                        credential.credential_type()
                    ),
                ));
            };

            // Operational faults propagate unchanged; outcome failures abort
            // with the provider's own code and message.
            let result = provider.authenticate(credential)?;
            if !result.success {
                warn!(
                    "MFA authentication failed: factor authentication failed - {}",
                    result.error_message.as_deref().unwrap_or("unknown")
                );
                return Ok(result);
            }

            satisfied.insert(kind);
            if first_success.is_none() {
                first_success = Some(result);
            }
        }

        if !self.policy_satisfied(&satisfied) {
            warn!("MFA authentication failed: policy requirements not satisfied");
            return Ok(AuthenticationResult::failure(
                ErrorCode::PolicyNotSatisfied,
                "multi-factor policy requirements not satisfied",
            ));
        }

        let principal = match first_success.and_then(|result| result.principal) {
            Some(base) => Principal {
                authentication_time: Utc::now(),
                authentication_type: "mfa".to_string(),
                ..base
            },
            None => Principal::new(identifier.as_str(), identifier.as_str(), "mfa"),
        };

        info!(
            "MFA authentication successful for identifier {} with {} factors",
            identifier,
            satisfied.len()
        );
        Ok(AuthenticationResult::success(principal))
    }

    fn policy_satisfied(&self, satisfied: &HashSet<AuthenticatorType>) -> bool {
        if satisfied.len() < self.policy.minimum_factors {
            debug!(
                "policy validation failed: insufficient factors (required: {}, satisfied: {})",
                self.policy.minimum_factors,
                satisfied.len()
            );
            return false;
        }

        for required in &self.policy.required_types {
            if !satisfied.contains(required) {
                debug!("policy validation failed: required type not satisfied: {}", required);
                return false;
            }
        }

        for kind in satisfied {
            if !self.policy.is_type_allowed(*kind) {
                debug!("policy validation failed: type not allowed: {}", kind);
                return false;
            }
        }

        true
    }

    fn find_provider(&self, credential: &Credential) -> Option<&Arc<dyn AuthenticationProvider>> {
        self.providers
            .values()
            .find(|provider| provider.supports(credential))
    }
}
