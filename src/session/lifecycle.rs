//! Session creation, renewal, termination, and concurrent-session accounting.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{Result, SessionError};
use crate::session::security::{SessionHijackingPrevention, SessionIdGenerator};
use crate::session::store::SessionStore;
use crate::session::{Session, SessionState};

/// Creates new [`Session`] instances with generated ids.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    id_generator: SessionIdGenerator,
}

impl SessionFactory {
    pub fn new(id_generator: SessionIdGenerator) -> Self {
        Self { id_generator }
    }

    /// Create a new session for a user.
    pub fn create_session(&self, user_id: &str) -> Session {
        Session::new(self.id_generator.generate(), user_id)
    }

    /// Create a new session bound to a request origin.
    pub fn create_session_with_context(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Session {
        let mut session = self.create_session(user_id);
        session.ip_address = Some(ip_address.to_string());
        session.user_agent = Some(user_agent.to_string());
        session
    }
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self::new(SessionIdGenerator::default())
    }
}

/// Creates sessions, enforcing the concurrent-session limit first.
pub struct SessionCreationService<S: SessionStore> {
    factory: SessionFactory,
    store: Arc<S>,
    hijacking_prevention: SessionHijackingPrevention,
}

impl<S: SessionStore> SessionCreationService<S> {
    pub fn new(
        factory: SessionFactory,
        store: Arc<S>,
        hijacking_prevention: SessionHijackingPrevention,
    ) -> Self {
        Self {
            factory,
            store,
            hijacking_prevention,
        }
    }

    /// Create a new session for a user.
    pub fn create_session(&self, user_id: &str) -> Result<Session> {
        self.check_concurrent_limit(user_id)?;
        let session = self.factory.create_session(user_id);
        self.store.save(session.clone())?;
        info!("created session {} for user {}", session.session_id, user_id);
        Ok(session)
    }

    /// Create a new session bound to a request origin.
    pub fn create_session_with_context(
        &self,
        user_id: &str,
        ip_address: &str,
        user_agent: &str,
    ) -> Result<Session> {
        self.check_concurrent_limit(user_id)?;
        let session = self
            .factory
            .create_session_with_context(user_id, ip_address, user_agent);
        self.store.save(session.clone())?;
        info!(
            "created session {} for user {} from IP {}",
            session.session_id, user_id, ip_address
        );
        Ok(session)
    }

    fn check_concurrent_limit(&self, user_id: &str) -> Result<()> {
        let active_count = self.store.count_active_for_user(user_id)?;
        if self
            .hijacking_prevention
            .is_concurrent_session_limit_exceeded(active_count)
        {
            warn!(
                "concurrent session limit exceeded for user {}: {} active sessions",
                user_id, active_count
            );
            return Err(SessionError::ConcurrentLimitExceeded {
                user_id: user_id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Renews sessions and regenerates session ids.
pub struct SessionRenewalService<S: SessionStore> {
    store: Arc<S>,
    id_generator: SessionIdGenerator,
}

impl<S: SessionStore> SessionRenewalService<S> {
    pub fn new(store: Arc<S>, id_generator: SessionIdGenerator) -> Self {
        Self { store, id_generator }
    }

    /// Renew a session: updates the last-accessed time and access count.
    /// Only ACTIVE and REQUIRES_REAUTH sessions renew.
    pub fn renew_session(&self, session_id: &str) -> Result<bool> {
        let mut renewed = false;
        let found = self.store.update(session_id, &mut |session| {
            if matches!(
                session.state,
                SessionState::Active | SessionState::RequiresReauth
            ) {
                session.update_last_accessed();
                renewed = true;
            }
        })?;

        if !found {
            warn!("cannot renew session {}: not found", session_id);
            return Ok(false);
        }
        if !renewed {
            warn!("cannot renew session {}: invalid state", session_id);
            return Ok(false);
        }
        debug!("renewed session {}", session_id);
        Ok(true)
    }

    /// Regenerate a session id to defeat fixation.
    ///
    /// The replacement inherits the state, origin binding, and both attribute
    /// maps; its creation time resets to now. The old entry is deleted once
    /// the new one is persisted.
    pub fn regenerate_session_id(&self, old_session_id: &str) -> Result<Option<String>> {
        let Some(old_session) = self.store.find_by_id(old_session_id)? else {
            warn!("cannot regenerate session id for {}: not found", old_session_id);
            return Ok(None);
        };

        let new_session_id = self.id_generator.generate();
        let mut session = Session::new(new_session_id.clone(), old_session.user_id.clone());
        session.state = old_session.state;
        session.ip_address = old_session.ip_address.clone();
        session.user_agent = old_session.user_agent.clone();
        session.attributes = old_session.attributes.clone();
        session.security_attributes = old_session.security_attributes.clone();

        self.store.save(session)?;
        self.store.delete(old_session_id)?;

        info!("regenerated session id: {} -> {}", old_session_id, new_session_id);
        Ok(Some(new_session_id))
    }

    /// Refresh a session after a successful re-authentication: pending
    /// demands clear and a REQUIRES_REAUTH session returns to ACTIVE.
    pub fn refresh_after_reauth(&self, session_id: &str) -> Result<bool> {
        let found = self.store.update(session_id, &mut |session| {
            session.mark_reauthenticated();
            session.update_last_accessed();
        })?;

        if !found {
            warn!("cannot refresh session {}: not found", session_id);
            return Ok(false);
        }
        info!("refreshed session {} after re-authentication", session_id);
        Ok(true)
    }
}

/// Terminates and deletes sessions.
pub struct SessionTerminationService<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionTerminationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Terminate a session. The record is retained in the TERMINATED state.
    pub fn terminate_session(&self, session_id: &str) -> Result<bool> {
        let mut terminated = false;
        let found = self.store.update(session_id, &mut |session| {
            terminated = session.transition(SessionState::Terminated);
        })?;

        if !found {
            warn!("cannot terminate session {}: not found", session_id);
            return Ok(false);
        }
        info!("terminated session {}", session_id);
        Ok(terminated)
    }

    /// Terminate every non-terminated session of a user; returns the count.
    pub fn terminate_all_user_sessions(&self, user_id: &str) -> Result<u32> {
        let mut terminated_count = 0;
        for session in self.store.find_by_user(user_id)? {
            if session.state != SessionState::Terminated {
                let did = self.terminate_session_quietly(&session.session_id)?;
                if did {
                    terminated_count += 1;
                }
            }
        }
        info!("terminated {} sessions for user {}", terminated_count, user_id);
        Ok(terminated_count)
    }

    fn terminate_session_quietly(&self, session_id: &str) -> Result<bool> {
        let mut terminated = false;
        self.store.update(session_id, &mut |session| {
            terminated = session.transition(SessionState::Terminated);
        })?;
        Ok(terminated)
    }

    /// Remove a session record entirely.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id)?;
        info!("deleted session {}", session_id);
        Ok(())
    }

    /// Remove all session records for a user.
    pub fn delete_all_user_sessions(&self, user_id: &str) -> Result<()> {
        self.store.delete_by_user(user_id)?;
        info!("deleted all sessions for user {}", user_id);
        Ok(())
    }

    /// Force-expire a session.
    pub fn expire_session(&self, session_id: &str) -> Result<bool> {
        let mut expired = false;
        let found = self.store.update(session_id, &mut |session| {
            expired = session.transition(SessionState::Expired);
        })?;

        if !found {
            warn!("cannot expire session {}: not found", session_id);
            return Ok(false);
        }
        info!("expired session {}", session_id);
        Ok(expired)
    }
}

/// Concurrent-session accounting and conflict resolution.
pub struct ConcurrentSessionManager<S: SessionStore> {
    store: Arc<S>,
    max_concurrent_sessions: u32,
}

impl<S: SessionStore> ConcurrentSessionManager<S> {
    pub fn new(store: Arc<S>, max_concurrent_sessions: u32) -> Self {
        Self {
            store,
            max_concurrent_sessions,
        }
    }

    /// All active (ACTIVE or REQUIRES_REAUTH) sessions of a user.
    pub fn active_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .store
            .find_by_user(user_id)?
            .into_iter()
            .filter(|session| {
                matches!(
                    session.state,
                    SessionState::Active | SessionState::RequiresReauth
                )
            })
            .collect())
    }

    /// Number of active sessions of a user.
    pub fn active_session_count(&self, user_id: &str) -> Result<u32> {
        self.store.count_active_for_user(user_id)
    }

    /// Whether the user has hit the concurrent-session limit.
    pub fn has_reached_limit(&self, user_id: &str) -> Result<bool> {
        Ok(self.active_session_count(user_id)? >= self.max_concurrent_sessions)
    }

    /// Terminate the oldest active session when the limit is met or exceeded.
    /// Oldest is the smallest creation time; ties break on the session id.
    pub fn terminate_oldest_if_limit_exceeded(&self, user_id: &str) -> Result<bool> {
        let active = self.active_sessions(user_id)?;
        if (active.len() as u32) < self.max_concurrent_sessions {
            return Ok(false);
        }

        let Some(oldest) = active
            .into_iter()
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.session_id.cmp(&b.session_id))
            })
        else {
            return Ok(false);
        };

        let mut terminated = false;
        self.store.update(&oldest.session_id, &mut |session| {
            terminated = session.transition(SessionState::Terminated);
        })?;
        if terminated {
            info!(
                "terminated oldest session {} for user {} due to concurrent session limit",
                oldest.session_id, user_id
            );
        }
        Ok(terminated)
    }

    /// Terminate every non-terminated session of a user except `keep_session_id`.
    /// Returns the number of sessions terminated.
    pub fn terminate_all_except(&self, user_id: &str, keep_session_id: &str) -> Result<u32> {
        let mut terminated_count = 0;
        for session in self.store.find_by_user(user_id)? {
            if session.session_id != keep_session_id
                && session.state != SessionState::Terminated
            {
                let mut terminated = false;
                self.store.update(&session.session_id, &mut |session| {
                    terminated = session.transition(SessionState::Terminated);
                })?;
                if terminated {
                    terminated_count += 1;
                }
            }
        }
        info!(
            "terminated {} sessions for user {}, keeping session {}",
            terminated_count, user_id, keep_session_id
        );
        Ok(terminated_count)
    }
}
