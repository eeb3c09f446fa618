//! Authenticated principals.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An authenticated user or service.
///
/// Roles are stored as opaque attributes; the core does not evaluate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier of the subject.
    pub identifier: String,
    /// Display name.
    pub name: String,
    /// Opaque role names attached to the subject.
    pub roles: HashSet<String>,
    /// When the subject proved its identity.
    pub authentication_time: DateTime<Utc>,
    /// How the subject proved its identity ("password", "pki_cert", "mfa", ...).
    pub authentication_type: String,
    /// Whether this principal represents a service account.
    pub service_account: bool,
}

impl Principal {
    /// Create a principal authenticated now, with no roles.
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        authentication_type: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            roles: HashSet::new(),
            authentication_time: Utc::now(),
            authentication_type: authentication_type.into(),
            service_account: false,
        }
    }

    /// Attach roles to the principal.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = String>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    /// Mark the principal as a service account.
    pub fn service_account(mut self) -> Self {
        self.service_account = true;
        self
    }

    /// Whether the principal carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the principal carries at least one of the given roles.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.roles.contains(*role))
    }
}
