//! Re-authentication policy, triggers, and timeout evaluation.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::config::AuthConfig;
use crate::session::{ReauthReason, Session, SessionState};

/// When re-authentication is demanded, beyond explicit triggers.
#[derive(Debug, Clone)]
pub struct ReauthenticationPolicy {
    /// Maximum age of the last re-authentication before a demand is raised.
    pub reauth_timeout_seconds: u64,
    pub require_reauth_on_privilege_escalation: bool,
    pub require_reauth_on_role_change: bool,
    pub require_reauth_on_security_attribute_change: bool,
    /// Organization-defined policy values, keyed by name.
    pub organization_policies: HashMap<String, Value>,
}

impl Default for ReauthenticationPolicy {
    fn default() -> Self {
        Self {
            reauth_timeout_seconds: 3600,
            require_reauth_on_privilege_escalation: true,
            require_reauth_on_role_change: true,
            require_reauth_on_security_attribute_change: true,
            organization_policies: HashMap::new(),
        }
    }
}

impl ReauthenticationPolicy {
    /// Build a policy from the runtime configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            reauth_timeout_seconds: config.reauth_timeout_seconds,
            ..Self::default()
        }
    }

    /// Whether the session must re-authenticate: demands already pending, or
    /// the last re-authentication is older than the timeout.
    pub fn requires_reauthentication(&self, session: &Session) -> bool {
        if session.requires_reauthentication() {
            return true;
        }
        session.seconds_since_last_reauth() > self.reauth_timeout_seconds as i64
    }

    /// An organization-defined policy value.
    pub fn organization_policy(&self, key: &str) -> Option<&Value> {
        self.organization_policies.get(key)
    }
}

/// Raises re-authentication demands on sessions according to the policy.
#[derive(Debug, Clone)]
pub struct ReauthenticationTrigger {
    policy: ReauthenticationPolicy,
}

impl ReauthenticationTrigger {
    pub fn new(policy: ReauthenticationPolicy) -> Self {
        Self { policy }
    }

    /// The policy consulted by this trigger.
    pub fn policy(&self) -> &ReauthenticationPolicy {
        &self.policy
    }

    /// Raise a timeout demand if the re-authentication age exceeds the
    /// policy; returns whether re-authentication is now required.
    pub fn check_and_trigger(&self, session: &mut Session) -> bool {
        if session.requires_reauthentication() {
            return true;
        }
        if session.seconds_since_last_reauth() > self.policy.reauth_timeout_seconds as i64 {
            self.trigger(session, ReauthReason::SessionTimeout);
            return true;
        }
        false
    }

    pub fn trigger_privilege_escalation(&self, session: &mut Session) {
        if self.policy.require_reauth_on_privilege_escalation {
            self.trigger(session, ReauthReason::PrivilegeEscalation);
        }
    }

    pub fn trigger_role_change(&self, session: &mut Session) {
        if self.policy.require_reauth_on_role_change {
            self.trigger(session, ReauthReason::RoleChange);
        }
    }

    pub fn trigger_security_attribute_change(&self, session: &mut Session) {
        if self.policy.require_reauth_on_security_attribute_change {
            self.trigger(session, ReauthReason::SecurityAttributeChange);
        }
    }

    pub fn trigger_suspicious_activity(&self, session: &mut Session) {
        self.trigger(session, ReauthReason::SuspiciousActivity);
    }

    pub fn trigger_organization_defined(&self, session: &mut Session) {
        self.trigger(session, ReauthReason::OrganizationDefined);
    }

    fn trigger(&self, session: &mut Session, reason: ReauthReason) {
        session.add_reauth_reason(reason);
        info!(
            "triggered re-authentication for session {} due to {:?}",
            session.session_id, reason
        );
    }
}

/// Evaluates the three independent session timeouts.
///
/// Evaluation order per tick: expiration, then inactivity, then
/// re-authentication age. The first matching rule wins.
#[derive(Debug, Clone)]
pub struct SessionTimeoutManager {
    session_timeout_seconds: u64,
    inactivity_timeout_seconds: u64,
    reauth_timeout_seconds: u64,
}

impl SessionTimeoutManager {
    pub fn new(
        session_timeout_seconds: u64,
        inactivity_timeout_seconds: u64,
        reauth_timeout_seconds: u64,
    ) -> Self {
        Self {
            session_timeout_seconds,
            inactivity_timeout_seconds,
            reauth_timeout_seconds,
        }
    }

    /// Build a timeout manager from the runtime configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            session_timeout_seconds: config.session_timeout_minutes * 60,
            inactivity_timeout_seconds: config.inactivity_timeout_seconds,
            reauth_timeout_seconds: config.reauth_timeout_seconds,
        }
    }

    /// Whether the session has exceeded its maximum lifetime.
    pub fn is_session_timed_out(&self, session: &Session) -> bool {
        session.session_age_seconds() > self.session_timeout_seconds as i64
    }

    /// Whether the session has been idle too long.
    pub fn is_session_inactive(&self, session: &Session) -> bool {
        session.seconds_since_last_access() > self.inactivity_timeout_seconds as i64
    }

    /// Whether the last re-authentication is too old.
    pub fn requires_reauth_due_to_timeout(&self, session: &Session) -> bool {
        session.seconds_since_last_reauth() > self.reauth_timeout_seconds as i64
    }

    /// Apply the per-tick timeout rules; returns whether state changed.
    pub fn process_timeouts(&self, session: &mut Session) -> bool {
        if self.is_session_timed_out(session) {
            info!("session {} has exceeded maximum lifetime", session.session_id);
            session.transition(SessionState::Expired)
        } else if self.is_session_inactive(session) {
            info!("session {} has been inactive too long", session.session_id);
            session.transition(SessionState::Expired)
        } else if self.requires_reauth_due_to_timeout(session) {
            info!(
                "session {} requires re-authentication due to timeout",
                session.session_id
            );
            session.add_reauth_reason(ReauthReason::SessionTimeout);
            true
        } else {
            false
        }
    }

    /// Seconds until the session lifetime runs out, clamped at zero.
    pub fn remaining_session_time(&self, session: &Session) -> u64 {
        clamp_remaining(self.session_timeout_seconds, session.session_age_seconds())
    }

    /// Seconds until the inactivity timeout, clamped at zero.
    pub fn remaining_inactivity_time(&self, session: &Session) -> u64 {
        clamp_remaining(
            self.inactivity_timeout_seconds,
            session.seconds_since_last_access(),
        )
    }

    /// Seconds until re-authentication is demanded, clamped at zero.
    pub fn remaining_reauth_time(&self, session: &Session) -> u64 {
        clamp_remaining(
            self.reauth_timeout_seconds,
            session.seconds_since_last_reauth(),
        )
    }
}

fn clamp_remaining(timeout: u64, elapsed: i64) -> u64 {
    (timeout as i64 - elapsed).max(0) as u64
}

/// Detects privilege and role changes that demand re-authentication.
#[derive(Debug, Clone)]
pub struct PrivilegeChangeDetector {
    trigger: ReauthenticationTrigger,
}

impl PrivilegeChangeDetector {
    pub fn new(trigger: ReauthenticationTrigger) -> Self {
        Self { trigger }
    }

    /// Whether the requested privilege goes beyond the session's current
    /// privileges; raises a demand if so.
    pub fn detect_privilege_escalation(
        &self,
        session: &mut Session,
        requested_privilege: &str,
    ) -> bool {
        let held = match session.security_attribute("privileges") {
            Some(Value::Array(privileges)) => privileges
                .iter()
                .any(|privilege| privilege.as_str() == Some(requested_privilege)),
            _ => false,
        };

        if !held {
            info!(
                "privilege escalation detected for session {}: requesting {}",
                session.session_id, requested_privilege
            );
            self.trigger.trigger_privilege_escalation(session);
            return true;
        }
        false
    }

    /// Whether the subject's role changed; raises a demand if so.
    pub fn detect_role_change(&self, session: &mut Session, new_role: &str) -> bool {
        let current_role = session
            .security_attribute("role")
            .and_then(|value| value.as_str().map(str::to_string));

        if let Some(current) = current_role {
            if current != new_role {
                info!(
                    "role change detected for session {}: {} -> {}",
                    session.session_id, current, new_role
                );
                self.trigger.trigger_role_change(session);
                return true;
            }
        }
        false
    }

    /// Whether a security attribute changed value; raises a demand if so.
    pub fn detect_security_attribute_change(
        &self,
        session: &mut Session,
        key: &str,
        new_value: &Value,
    ) -> bool {
        if let Some(current) = session.security_attribute(key) {
            if current != new_value {
                info!(
                    "security attribute change detected for session {}: {} changed",
                    session.session_id, key
                );
                self.trigger.trigger_security_attribute_change(session);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn backdated(seconds: i64) -> Session {
        let mut session = Session::new("sess-1", "alice");
        let past = Utc::now() - Duration::seconds(seconds);
        session.created_at = past;
        session.last_accessed = past;
        session.last_reauthentication = past;
        session
    }

    #[test]
    fn test_policy_timeout() {
        let policy = ReauthenticationPolicy {
            reauth_timeout_seconds: 60,
            ..ReauthenticationPolicy::default()
        };
        let fresh = Session::new("sess-1", "alice");
        assert!(!policy.requires_reauthentication(&fresh));

        let mut stale = Session::new("sess-2", "alice");
        stale.last_reauthentication = Utc::now() - Duration::seconds(120);
        assert!(policy.requires_reauthentication(&stale));
    }

    #[test]
    fn test_policy_pending_reasons_short_circuit() {
        let policy = ReauthenticationPolicy::default();
        let mut session = Session::new("sess-1", "alice");
        session.add_reauth_reason(ReauthReason::ManualRequest);
        assert!(policy.requires_reauthentication(&session));
    }

    #[test]
    fn test_trigger_honors_policy_flags() {
        let trigger = ReauthenticationTrigger::new(ReauthenticationPolicy {
            require_reauth_on_role_change: false,
            ..ReauthenticationPolicy::default()
        });
        let mut session = Session::new("sess-1", "alice");
        trigger.trigger_role_change(&mut session);
        assert!(!session.requires_reauthentication());

        trigger.trigger_privilege_escalation(&mut session);
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::PrivilegeEscalation));
    }

    #[test]
    fn test_unconditional_triggers() {
        let trigger = ReauthenticationTrigger::new(ReauthenticationPolicy::default());
        let mut session = Session::new("sess-1", "alice");
        trigger.trigger_suspicious_activity(&mut session);
        trigger.trigger_organization_defined(&mut session);
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::SuspiciousActivity));
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::OrganizationDefined));
        assert_eq!(session.state, SessionState::RequiresReauth);
    }

    #[test]
    fn test_organization_policy_lookup() {
        let mut policy = ReauthenticationPolicy::default();
        policy
            .organization_policies
            .insert("export-control".to_string(), json!(true));
        assert_eq!(policy.organization_policy("export-control"), Some(&json!(true)));
        assert!(policy.organization_policy("missing").is_none());
    }

    #[test]
    fn test_check_and_trigger_adds_timeout_reason() {
        let trigger = ReauthenticationTrigger::new(ReauthenticationPolicy {
            reauth_timeout_seconds: 60,
            ..ReauthenticationPolicy::default()
        });
        let mut session = backdated(120);
        assert!(trigger.check_and_trigger(&mut session));
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::SessionTimeout));
        assert_eq!(session.state, SessionState::RequiresReauth);
    }

    #[test]
    fn test_expiration_wins_over_inactivity_and_reauth() {
        let manager = SessionTimeoutManager::new(100, 100, 100);
        let mut session = backdated(200);
        assert!(manager.process_timeouts(&mut session));
        assert_eq!(session.state, SessionState::Expired);
        assert!(session.pending_reauth_reasons.is_empty());
    }

    #[test]
    fn test_inactivity_expires_before_reauth_demand() {
        let manager = SessionTimeoutManager::new(10_000, 100, 100);
        let mut session = backdated(200);
        session.created_at = Utc::now();
        assert!(manager.process_timeouts(&mut session));
        assert_eq!(session.state, SessionState::Expired);
        assert!(session.pending_reauth_reasons.is_empty());
    }

    #[test]
    fn test_reauth_age_demands_without_expiring() {
        let manager = SessionTimeoutManager::new(10_000, 10_000, 100);
        let mut session = backdated(200);
        session.created_at = Utc::now();
        session.last_accessed = Utc::now();
        assert!(manager.process_timeouts(&mut session));
        assert_eq!(session.state, SessionState::RequiresReauth);
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::SessionTimeout));
    }

    #[test]
    fn test_fresh_session_passes_all_timeouts() {
        let manager = SessionTimeoutManager::new(100, 100, 100);
        let mut session = Session::new("sess-1", "alice");
        assert!(!manager.process_timeouts(&mut session));
        assert_eq!(session.state, SessionState::Active);
    }

    #[test]
    fn test_remaining_times_clamp_to_zero() {
        let manager = SessionTimeoutManager::new(100, 100, 100);
        let session = backdated(500);
        assert_eq!(manager.remaining_session_time(&session), 0);
        assert_eq!(manager.remaining_inactivity_time(&session), 0);
        assert_eq!(manager.remaining_reauth_time(&session), 0);

        let fresh = Session::new("sess-2", "alice");
        assert!(manager.remaining_session_time(&fresh) > 90);
    }

    #[test]
    fn test_privilege_escalation_detection() {
        let detector =
            PrivilegeChangeDetector::new(ReauthenticationTrigger::new(Default::default()));
        let mut session = Session::new("sess-1", "alice");
        session.set_security_attribute("privileges", json!(["read", "write"]));

        assert!(!detector.detect_privilege_escalation(&mut session, "read"));
        assert!(!session.requires_reauthentication());

        assert!(detector.detect_privilege_escalation(&mut session, "admin"));
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::PrivilegeEscalation));
    }

    #[test]
    fn test_role_change_detection() {
        let detector =
            PrivilegeChangeDetector::new(ReauthenticationTrigger::new(Default::default()));
        let mut session = Session::new("sess-1", "alice");
        session.set_security_attribute("role", json!("examiner"));

        assert!(!detector.detect_role_change(&mut session, "examiner"));
        assert!(detector.detect_role_change(&mut session, "admin"));
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::RoleChange));
    }

    #[test]
    fn test_security_attribute_change_detection() {
        let detector =
            PrivilegeChangeDetector::new(ReauthenticationTrigger::new(Default::default()));
        let mut session = Session::new("sess-1", "alice");
        session.set_security_attribute("clearance", json!("secret"));

        assert!(!detector.detect_security_attribute_change(
            &mut session,
            "clearance",
            &json!("secret")
        ));
        // Unknown attributes do not raise a demand.
        assert!(!detector.detect_security_attribute_change(&mut session, "unknown", &json!("x")));
        assert!(detector.detect_security_attribute_change(
            &mut session,
            "clearance",
            &json!("top-secret")
        ));
        assert!(session
            .pending_reauth_reasons
            .contains(&ReauthReason::SecurityAttributeChange));
    }
}
