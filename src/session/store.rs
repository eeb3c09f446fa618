//! Session persistence.

use dashmap::DashMap;

use crate::errors::Result;
use crate::session::{Session, SessionState};

/// Contract for session persistence.
///
/// The closure-based `update` lets implementations hold per-key exclusivity
/// for the whole read-modify-write; services use it for every mutation of a
/// stored session.
pub trait SessionStore: Send + Sync {
    /// Store a session, replacing any existing one with the same id.
    fn save(&self, session: Session) -> Result<()>;

    /// Retrieve a session by id.
    fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Retrieve all sessions for a user.
    fn find_by_user(&self, user_id: &str) -> Result<Vec<Session>>;

    /// Mutate a stored session in place under per-key exclusivity.
    /// Returns `false` when no such session exists.
    fn update(
        &self,
        session_id: &str,
        mutate: &mut dyn FnMut(&mut Session),
    ) -> Result<bool>;

    /// Delete a session.
    fn delete(&self, session_id: &str) -> Result<()>;

    /// Delete all sessions for a user.
    fn delete_by_user(&self, user_id: &str) -> Result<()>;

    /// Whether a session exists.
    fn exists(&self, session_id: &str) -> Result<bool>;

    /// Number of active (ACTIVE or REQUIRES_REAUTH) sessions for a user.
    fn count_active_for_user(&self, user_id: &str) -> Result<u32>;
}

/// In-memory session store on a concurrent map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored sessions, in any state.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn counts_as_active(state: SessionState) -> bool {
    matches!(state, SessionState::Active | SessionState::RequiresReauth)
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.session_id.clone(), session);
        Ok(())
    }

    fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(session_id).map(|entry| entry.value().clone()))
    }

    fn find_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn update(
        &self,
        session_id: &str,
        mutate: &mut dyn FnMut(&mut Session),
    ) -> Result<bool> {
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                mutate(entry.value_mut());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    fn delete_by_user(&self, user_id: &str) -> Result<()> {
        self.sessions.retain(|_, session| session.user_id != user_id);
        Ok(())
    }

    fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.contains_key(session_id))
    }

    fn count_active_for_user(&self, user_id: &str) -> Result<u32> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.user_id == user_id && counts_as_active(session.state)
            })
            .count() as u32)
    }
}
