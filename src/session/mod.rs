//! Session model and lifecycle subsystem.
//!
//! A [`Session`] is the server-side record of an ongoing authenticated
//! interaction, keyed by an opaque high-entropy id. The submodules provide
//! persistence ([`store`]), creation/renewal/termination ([`lifecycle`]),
//! re-authentication policy and timeouts ([`reauth`]), hijacking prevention
//! ([`security`]), and the orchestrator ([`manager`]).

pub mod lifecycle;
pub mod manager;
pub mod reauth;
pub mod security;
pub mod store;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AuthError, Result};
use crate::security::{AttributeEncryption, SealedAttribute};

pub use lifecycle::{
    ConcurrentSessionManager, SessionCreationService, SessionFactory, SessionRenewalService,
    SessionTerminationService,
};
pub use manager::{SessionManager, SessionValidator};
pub use reauth::{
    PrivilegeChangeDetector, ReauthenticationPolicy, ReauthenticationTrigger,
    SessionTimeoutManager,
};
pub use security::{SessionHijackingPrevention, SessionIdGenerator};
pub use store::{MemorySessionStore, SessionStore};

/// Session lifecycle states.
///
/// `Expired` and `Terminated` are terminal; nothing transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session is live and valid.
    Active,
    /// Session is live but must re-authenticate before sensitive use.
    RequiresReauth,
    /// Session has expired.
    Expired,
    /// Session has been terminated.
    Terminated,
    /// Session is temporarily suspended.
    Suspended,
}

impl SessionState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Active => "active",
            Self::RequiresReauth => "requires_reauth",
            Self::Expired => "expired",
            Self::Terminated => "terminated",
            Self::Suspended => "suspended",
        };
        f.write_str(value)
    }
}

/// Circumstances requiring the principal to prove identity again without
/// invalidating the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthReason {
    /// Time-based re-authentication demand.
    SessionTimeout,
    /// Access to higher-privilege resources requested.
    PrivilegeEscalation,
    /// The subject's role or permissions changed.
    RoleChange,
    /// A security-relevant attribute was modified.
    SecurityAttributeChange,
    /// Configurable, organization-defined trigger.
    OrganizationDefined,
    /// Suspicious activity detected.
    SuspiciousActivity,
    /// Manual re-authentication request.
    ManualRequest,
    /// Session renewal required.
    SessionRenewal,
}

/// An authenticated session with re-authentication tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// High-entropy, URL-safe session id.
    pub session_id: String,
    /// The user this session belongs to.
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub last_reauthentication: DateTime<Utc>,
    pub state: SessionState,
    /// Number of accesses since creation.
    pub access_count: u64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Application data attached to the session.
    pub attributes: HashMap<String, Value>,
    /// Security-relevant attributes (roles, privileges, clearances).
    pub security_attributes: HashMap<String, Value>,
    /// Outstanding re-authentication demands.
    pub pending_reauth_reasons: HashSet<ReauthReason>,
}

impl Session {
    /// Create a session that begins ACTIVE with all timestamps at now.
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            created_at: now,
            last_accessed: now,
            last_reauthentication: now,
            state: SessionState::Active,
            access_count: 0,
            ip_address: None,
            user_agent: None,
            attributes: HashMap::new(),
            security_attributes: HashMap::new(),
            pending_reauth_reasons: HashSet::new(),
        }
    }

    /// Record an access: bumps the access count and the last-accessed time.
    pub fn update_last_accessed(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }

    /// Record a successful re-authentication: clears pending demands and
    /// returns a REQUIRES_REAUTH session to ACTIVE.
    pub fn mark_reauthenticated(&mut self) {
        self.last_reauthentication = Utc::now();
        self.pending_reauth_reasons.clear();
        if self.state == SessionState::RequiresReauth {
            self.state = SessionState::Active;
        }
    }

    /// Whether the session is in the ACTIVE state.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Whether the principal must re-authenticate: the state demands it, or
    /// demands are pending.
    pub fn requires_reauthentication(&self) -> bool {
        self.state == SessionState::RequiresReauth || !self.pending_reauth_reasons.is_empty()
    }

    /// Add a re-authentication demand; an ACTIVE session transitions to
    /// REQUIRES_REAUTH.
    pub fn add_reauth_reason(&mut self, reason: ReauthReason) {
        self.pending_reauth_reasons.insert(reason);
        if self.state == SessionState::Active {
            self.state = SessionState::RequiresReauth;
        }
    }

    /// Drop all pending re-authentication demands without touching the state.
    pub fn clear_reauth_reasons(&mut self) {
        self.pending_reauth_reasons.clear();
    }

    /// Move to `next` unless the current state is terminal.
    /// Returns whether the transition happened.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = next;
        true
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn set_security_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.security_attributes.insert(key.into(), value);
    }

    pub fn security_attribute(&self, key: &str) -> Option<&Value> {
        self.security_attributes.get(key)
    }

    /// Store a security attribute sealed with authenticated encryption; the
    /// map holds only the ciphertext container.
    pub fn set_sealed_security_attribute(
        &mut self,
        key: impl Into<String>,
        value: &Value,
        encryption: &AttributeEncryption,
    ) -> Result<()> {
        let sealed = encryption.seal(&value.to_string())?;
        self.security_attributes
            .insert(key.into(), Value::String(sealed.into_inner()));
        Ok(())
    }

    /// Read back a sealed security attribute. Fails on tampering, a wrong
    /// key, or a value that was not stored sealed.
    pub fn sealed_security_attribute(
        &self,
        key: &str,
        encryption: &AttributeEncryption,
    ) -> Result<Option<Value>> {
        let Some(stored) = self.security_attributes.get(key) else {
            return Ok(None);
        };
        let Some(container) = stored.as_str() else {
            return Err(AuthError::crypto("stored security attribute is not sealed"));
        };
        let plaintext = encryption.open(&SealedAttribute::from(container))?;
        serde_json::from_str(&plaintext)
            .map(Some)
            .map_err(|_| AuthError::crypto("sealed attribute payload is not valid JSON"))
    }

    /// Session age in seconds (now minus creation time).
    pub fn session_age_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }

    /// Seconds since the last access.
    pub fn seconds_since_last_access(&self) -> i64 {
        (Utc::now() - self.last_accessed).num_seconds()
    }

    /// Seconds since the last re-authentication.
    pub fn seconds_since_last_reauth(&self) -> i64 {
        (Utc::now() - self.last_reauthentication).num_seconds()
    }
}
