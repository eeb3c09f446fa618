//! Session orchestration: the single entry point for higher layers.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::errors::Result;
use crate::session::lifecycle::{
    SessionCreationService, SessionFactory, SessionRenewalService, SessionTerminationService,
};
use crate::session::reauth::ReauthenticationPolicy;
use crate::session::security::{SessionHijackingPrevention, SessionIdGenerator};
use crate::session::store::SessionStore;
use crate::session::{ReauthReason, Session, SessionState};

/// Validates session state and integrity against configured limits.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    max_session_age_seconds: u64,
    max_inactivity_seconds: u64,
}

impl SessionValidator {
    pub fn new(max_session_age_seconds: u64, max_inactivity_seconds: u64) -> Self {
        Self {
            max_session_age_seconds,
            max_inactivity_seconds,
        }
    }

    /// Build a validator from the runtime configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            max_session_age_seconds: config.session_timeout_minutes * 60,
            max_inactivity_seconds: config.inactivity_timeout_seconds,
        }
    }

    /// Whether the session is still usable: not terminal, not over-age, not
    /// idle too long.
    pub fn is_valid(&self, session: &Session) -> bool {
        if session.state == SessionState::Terminated || session.state == SessionState::Expired {
            return false;
        }
        if self.is_expired(session) {
            return false;
        }
        if self.is_inactive(session) {
            return false;
        }
        true
    }

    /// Whether the session has exceeded its maximum age.
    pub fn is_expired(&self, session: &Session) -> bool {
        session.session_age_seconds() > self.max_session_age_seconds as i64
    }

    /// Whether the session has been idle too long.
    pub fn is_inactive(&self, session: &Session) -> bool {
        session.seconds_since_last_access() > self.max_inactivity_seconds as i64
    }

    /// Whether the request origin matches the stored security context.
    /// Absent stored values skip the corresponding check.
    pub fn validate_security_context(
        &self,
        session: &Session,
        current_ip: &str,
        current_user_agent: &str,
    ) -> bool {
        if let Some(stored_ip) = &session.ip_address {
            if stored_ip != current_ip {
                return false;
            }
        }
        if let Some(stored_agent) = &session.user_agent {
            if stored_agent != current_user_agent {
                return false;
            }
        }
        true
    }
}

/// Session orchestrator coordinating creation, validation, re-authentication,
/// and termination.
pub struct SessionManager<S: SessionStore> {
    store: Arc<S>,
    creation: SessionCreationService<S>,
    renewal: SessionRenewalService<S>,
    termination: SessionTerminationService<S>,
    validator: SessionValidator,
    reauth_policy: ReauthenticationPolicy,
}

impl<S: SessionStore> SessionManager<S> {
    /// Create an orchestrator from explicit components.
    pub fn new(
        store: Arc<S>,
        validator: SessionValidator,
        reauth_policy: ReauthenticationPolicy,
        hijacking_prevention: SessionHijackingPrevention,
    ) -> Self {
        let factory = SessionFactory::new(SessionIdGenerator::default());
        Self {
            creation: SessionCreationService::new(
                factory,
                store.clone(),
                hijacking_prevention,
            ),
            renewal: SessionRenewalService::new(store.clone(), SessionIdGenerator::default()),
            termination: SessionTerminationService::new(store.clone()),
            store,
            validator,
            reauth_policy,
        }
    }

    /// Create an orchestrator wired from the runtime configuration.
    pub fn from_config(store: Arc<S>, config: &AuthConfig) -> Self {
        Self::new(
            store,
            SessionValidator::from_config(config),
            ReauthenticationPolicy::from_config(config),
            SessionHijackingPrevention::new(true, true, config.max_concurrent_sessions),
        )
    }

    /// Create a new session, enforcing the concurrent-session limit.
    pub fn create_session(&self, user_id: &str) -> Result<Session> {
        self.creation.create_session(user_id)
    }

    /// Create a new session bound to a request origin.
    pub fn create_session_with_context(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Session> {
        self.creation
            .create_session_with_context(user_id, ip_address, user_agent)
    }

    /// Retrieve a session. An invalid session transitions to EXPIRED on read
    /// and `None` is returned.
    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(session) = self.store.find_by_id(session_id)? else {
            debug!("session {} not found", session_id);
            return Ok(None);
        };

        if !self.validator.is_valid(&session) {
            info!("session {} is invalid or expired", session_id);
            self.store.update(session_id, &mut |session| {
                session.transition(SessionState::Expired);
            })?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Whether the session exists and is valid.
    pub fn validate_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.get_session(session_id)?.is_some())
    }

    /// Record an access on the session.
    pub fn touch_session(&self, session_id: &str) -> Result<bool> {
        self.store.update(session_id, &mut |session| {
            session.update_last_accessed();
        })
    }

    /// Raise a re-authentication demand on the session.
    pub fn trigger_reauthentication(
        &self,
        session_id: &str,
        reason: ReauthReason,
    ) -> Result<bool> {
        let found = self.store.update(session_id, &mut |session| {
            session.add_reauth_reason(reason);
        })?;
        if found {
            info!(
                "triggered re-authentication for session {} due to {:?}",
                session_id, reason
            );
        }
        Ok(found)
    }

    /// Whether the session must re-authenticate, by its own demands or by
    /// policy timeout.
    pub fn is_reauthentication_required(&self, session: &Session) -> bool {
        if session.requires_reauthentication() {
            return true;
        }
        self.reauth_policy.requires_reauthentication(session)
    }

    /// Record a successful re-authentication on the session.
    pub fn mark_reauthenticated(&self, session_id: &str) -> Result<bool> {
        self.renewal.refresh_after_reauth(session_id)
    }

    /// Renew the session (ACTIVE or REQUIRES_REAUTH only).
    pub fn renew_session(&self, session_id: &str) -> Result<bool> {
        self.renewal.renew_session(session_id)
    }

    /// Swap the session id for a fresh one, preserving session state.
    pub fn regenerate_session_id(&self, session_id: &str) -> Result<Option<String>> {
        self.renewal.regenerate_session_id(session_id)
    }

    /// Terminate the session, retaining the record.
    pub fn terminate_session(&self, session_id: &str) -> Result<bool> {
        self.termination.terminate_session(session_id)
    }

    /// Terminate every non-terminated session of a user; returns the count.
    pub fn terminate_all_user_sessions(&self, user_id: &str) -> Result<u32> {
        self.termination.terminate_all_user_sessions(user_id)
    }

    /// Number of active (ACTIVE or REQUIRES_REAUTH) sessions of a user.
    pub fn active_session_count(&self, user_id: &str) -> Result<u32> {
        self.store.count_active_for_user(user_id)
    }
}
