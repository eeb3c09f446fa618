//! Session id generation and hijacking prevention.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{info, warn};

use crate::security::constant_time_eq;
use crate::session::Session;

/// Default entropy of a session id, in bytes.
const DEFAULT_SESSION_ID_BYTES: usize = 32;

/// Generates cryptographically strong, URL-safe session ids.
#[derive(Debug, Clone)]
pub struct SessionIdGenerator {
    length: usize,
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_SESSION_ID_BYTES,
        }
    }
}

impl SessionIdGenerator {
    /// Create a generator drawing `length` random bytes per id.
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Generate a session id: URL-safe base64 of random bytes, no padding.
    /// Falls back to a v4 uuid if the system RNG is unavailable.
    pub fn generate(&self) -> String {
        let mut bytes = vec![0u8; self.length];
        match SystemRandom::new().fill(&mut bytes) {
            Ok(()) => URL_SAFE_NO_PAD.encode(&bytes),
            Err(_) => uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Anti-hijacking measures: origin binding, fixation and anomaly detection,
/// and concurrent-session limiting.
#[derive(Debug, Clone)]
pub struct SessionHijackingPrevention {
    enforce_ip_binding: bool,
    enforce_user_agent_binding: bool,
    max_concurrent_sessions: u32,
}

impl SessionHijackingPrevention {
    pub fn new(
        enforce_ip_binding: bool,
        enforce_user_agent_binding: bool,
        max_concurrent_sessions: u32,
    ) -> Self {
        Self {
            enforce_ip_binding,
            enforce_user_agent_binding,
            max_concurrent_sessions,
        }
    }

    /// Validate that the request origin matches the session's stored binding.
    /// A binding with no stored value is skipped.
    pub fn validate_session_binding(
        &self,
        session: &Session,
        current_ip: &str,
        current_user_agent: &str,
    ) -> bool {
        if self.enforce_ip_binding {
            if let Some(stored_ip) = &session.ip_address {
                if stored_ip != current_ip {
                    warn!(
                        "session {} IP mismatch: expected {}, got {}",
                        session.session_id, stored_ip, current_ip
                    );
                    return false;
                }
            }
        }

        if self.enforce_user_agent_binding {
            if let Some(stored_agent) = &session.user_agent {
                if !constant_time_eq(stored_agent.as_bytes(), current_user_agent.as_bytes()) {
                    warn!(
                        "session {} User-Agent mismatch: expected {}, got {}",
                        session.session_id, stored_agent, current_user_agent
                    );
                    return false;
                }
            }
        }

        true
    }

    /// Flag a never-touched session that has been sitting for over five
    /// minutes.
    pub fn detect_session_fixation(&self, session: &Session) -> bool {
        if session.access_count == 0 && session.seconds_since_last_access() > 300 {
            warn!(
                "potential session fixation detected for session {}",
                session.session_id
            );
            return true;
        }
        false
    }

    /// Flag an IP change outside the stored /24 subnet, or an excessive
    /// access count.
    pub fn detect_suspicious_activity(&self, session: &Session, current_ip: &str) -> bool {
        if let Some(stored_ip) = &session.ip_address {
            if stored_ip != current_ip && !same_subnet(stored_ip, current_ip) {
                warn!(
                    "suspicious activity: session {} accessed from different subnet: {} -> {}",
                    session.session_id, stored_ip, current_ip
                );
                return true;
            }
        }

        if session.access_count > 1000 {
            warn!(
                "suspicious activity: session {} has excessive access count: {}",
                session.session_id, session.access_count
            );
            return true;
        }

        false
    }

    /// Whether the active-session count hits the configured limit.
    pub fn is_concurrent_session_limit_exceeded(&self, active_session_count: u32) -> bool {
        active_session_count >= self.max_concurrent_sessions
    }

    /// Draw a replacement session id. The caller is responsible for swapping
    /// the stored session.
    pub fn regenerate_session_id(
        &self,
        old_session_id: &str,
        generator: &SessionIdGenerator,
    ) -> String {
        let new_session_id = generator.generate();
        info!("regenerated session id: {} -> {}", old_session_id, new_session_id);
        new_session_id
    }
}

/// Simple /24 check: the first three dotted octets must match.
fn same_subnet(ip1: &str, ip2: &str) -> bool {
    let parts1: Vec<&str> = ip1.split('.').collect();
    let parts2: Vec<&str> = ip2.split('.').collect();

    if parts1.len() != 4 || parts2.len() != 4 {
        return false;
    }

    parts1[..3] == parts2[..3]
}
