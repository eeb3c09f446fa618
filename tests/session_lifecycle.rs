//! End-to-end tests for the session lifecycle: concurrent limits, id
//! regeneration, re-authentication, timeouts, and hijacking prevention.

use std::sync::Arc;

use access_core::{
    AttributeEncryption, AuthConfig, AuthError, MemorySessionStore, ReauthReason, SessionError,
    SessionHijackingPrevention, SessionManager, SessionState, SessionStore,
    SessionTimeoutManager,
};
use chrono::{Duration, Utc};
use serde_json::json;

fn config_with_limit(limit: u32) -> AuthConfig {
    AuthConfig {
        max_concurrent_sessions: limit,
        ..AuthConfig::default()
    }
}

#[test]
fn concurrent_limit_blocks_and_frees() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store, &config_with_limit(2));

    let first = manager.create_session("carol").unwrap();
    let _second = manager.create_session("carol").unwrap();

    let err = manager.create_session("carol").unwrap_err();
    assert!(matches!(
        err,
        AuthError::Session(SessionError::ConcurrentLimitExceeded { .. })
    ));

    manager.terminate_session(&first.session_id).unwrap();
    assert!(manager.create_session("carol").is_ok());
}

#[test]
fn sessions_requiring_reauth_count_toward_the_limit() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store, &config_with_limit(2));

    let first = manager.create_session("carol").unwrap();
    let _second = manager.create_session("carol").unwrap();
    manager
        .trigger_reauthentication(&first.session_id, ReauthReason::ManualRequest)
        .unwrap();

    assert_eq!(manager.active_session_count("carol").unwrap(), 2);
    assert!(manager.create_session("carol").is_err());
}

#[test]
fn regenerated_session_preserves_attributes() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());

    let session = manager
        .create_session_with_context("carol", "192.168.1.100", "Mozilla/5.0")
        .unwrap();
    store
        .update(&session.session_id, &mut |session| {
            session.set_attribute("key1", json!("value1"));
            session.set_security_attribute("role", json!("admin"));
        })
        .unwrap();

    let new_id = manager
        .regenerate_session_id(&session.session_id)
        .unwrap()
        .unwrap();
    assert_ne!(new_id, session.session_id);

    assert!(store.find_by_id(&session.session_id).unwrap().is_none());
    let regenerated = store.find_by_id(&new_id).unwrap().unwrap();
    assert_eq!(regenerated.attribute("key1"), Some(&json!("value1")));
    assert_eq!(regenerated.security_attribute("role"), Some(&json!("admin")));
    assert_eq!(regenerated.ip_address.as_deref(), Some("192.168.1.100"));
    assert_eq!(regenerated.user_agent.as_deref(), Some("Mozilla/5.0"));
    assert_eq!(regenerated.state, SessionState::Active);
    assert!(regenerated.created_at >= session.created_at);
    assert_eq!(regenerated.access_count, 0);
}

#[test]
fn sealed_attributes_survive_id_regeneration() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let encryption = AttributeEncryption::with_random_key();

    let session = manager.create_session("carol").unwrap();
    store
        .update(&session.session_id, &mut |session| {
            session
                .set_sealed_security_attribute("clearance", &json!("secret"), &encryption)
                .unwrap();
        })
        .unwrap();

    let new_id = manager
        .regenerate_session_id(&session.session_id)
        .unwrap()
        .unwrap();
    let regenerated = store.find_by_id(&new_id).unwrap().unwrap();

    // The ciphertext container travels with the session; only the key opens it.
    let at_rest = regenerated.security_attribute("clearance").unwrap();
    assert_ne!(at_rest, &json!("secret"));
    let opened = regenerated
        .sealed_security_attribute("clearance", &encryption)
        .unwrap()
        .unwrap();
    assert_eq!(opened, json!("secret"));

    let other = AttributeEncryption::with_random_key();
    assert!(regenerated
        .sealed_security_attribute("clearance", &other)
        .is_err());
}

#[test]
fn regenerating_a_missing_session_yields_none() {
    let manager = SessionManager::from_config(
        Arc::new(MemorySessionStore::new()),
        &AuthConfig::default(),
    );
    assert!(manager.regenerate_session_id("missing").unwrap().is_none());
}

#[test]
fn reauth_trigger_and_clear_round_trip() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let session = manager.create_session("carol").unwrap();

    manager
        .trigger_reauthentication(&session.session_id, ReauthReason::RoleChange)
        .unwrap();
    manager
        .trigger_reauthentication(&session.session_id, ReauthReason::SuspiciousActivity)
        .unwrap();

    let pending = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert_eq!(pending.state, SessionState::RequiresReauth);
    assert_eq!(pending.pending_reauth_reasons.len(), 2);
    assert!(manager.is_reauthentication_required(&pending));

    manager.mark_reauthenticated(&session.session_id).unwrap();
    let restored = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert_eq!(restored.state, SessionState::Active);
    assert!(restored.pending_reauth_reasons.is_empty());
    assert!(!restored.requires_reauthentication());
}

#[test]
fn renewal_rejects_terminal_states() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let session = manager.create_session("carol").unwrap();

    manager.terminate_session(&session.session_id).unwrap();
    assert!(!manager.renew_session(&session.session_id).unwrap());

    // Terminated is terminal: nothing brings the session back.
    manager.mark_reauthenticated(&session.session_id).unwrap();
    let stored = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert_eq!(stored.state, SessionState::Terminated);
}

#[test]
fn terminate_all_user_sessions_returns_count() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store, &config_with_limit(10));

    for _ in 0..3 {
        manager.create_session("carol").unwrap();
    }
    let kept = manager.create_session("dave").unwrap();

    assert_eq!(manager.terminate_all_user_sessions("carol").unwrap(), 3);
    assert_eq!(manager.active_session_count("carol").unwrap(), 0);
    assert!(manager.validate_session(&kept.session_id).unwrap());
}

#[test]
fn timeout_evaluation_order() {
    let timeouts = SessionTimeoutManager::new(3600, 1800, 600);
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());

    // Over the session lifetime: expired, no reauth reason recorded.
    let session = manager.create_session("erin").unwrap();
    store
        .update(&session.session_id, &mut |session| {
            session.created_at = Utc::now() - Duration::seconds(4000);
        })
        .unwrap();
    let mut aged = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(timeouts.process_timeouts(&mut aged));
    assert_eq!(aged.state, SessionState::Expired);
    assert!(aged.pending_reauth_reasons.is_empty());

    // Idle beyond the inactivity limit: expired.
    let session = manager.create_session("erin").unwrap();
    store
        .update(&session.session_id, &mut |session| {
            session.last_accessed = Utc::now() - Duration::seconds(2000);
        })
        .unwrap();
    let mut idle = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(timeouts.process_timeouts(&mut idle));
    assert_eq!(idle.state, SessionState::Expired);

    // Only the reauth age exceeded: demand raised, session stays live.
    let session = manager.create_session("erin").unwrap();
    store
        .update(&session.session_id, &mut |session| {
            session.last_reauthentication = Utc::now() - Duration::seconds(900);
        })
        .unwrap();
    let mut stale = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(timeouts.process_timeouts(&mut stale));
    assert_eq!(stale.state, SessionState::RequiresReauth);
    assert!(stale
        .pending_reauth_reasons
        .contains(&ReauthReason::SessionTimeout));
}

#[test]
fn stale_sessions_expire_on_read() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let session = manager.create_session("erin").unwrap();

    store
        .update(&session.session_id, &mut |session| {
            session.last_accessed = Utc::now() - Duration::hours(1);
        })
        .unwrap();

    assert!(manager.get_session(&session.session_id).unwrap().is_none());
    let stored = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert_eq!(stored.state, SessionState::Expired);
}

#[test]
fn hijacking_binding_and_subnet_detection() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let prevention = SessionHijackingPrevention::new(true, true, 5);

    let session = manager
        .create_session_with_context("frank", "192.168.1.100", "Mozilla/5.0")
        .unwrap();
    let stored = store.find_by_id(&session.session_id).unwrap().unwrap();

    assert!(prevention.validate_session_binding(&stored, "192.168.1.100", "Mozilla/5.0"));
    assert!(!prevention.validate_session_binding(&stored, "192.168.1.200", "Mozilla/5.0"));
    assert!(!prevention.validate_session_binding(&stored, "192.168.1.100", "curl/8.0"));

    // Same /24 is tolerated; a different network is flagged.
    assert!(!prevention.detect_suspicious_activity(&stored, "192.168.1.200"));
    assert!(prevention.detect_suspicious_activity(&stored, "10.0.0.1"));
}

#[test]
fn fixation_flags_untouched_aged_sessions() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store.clone(), &AuthConfig::default());
    let prevention = SessionHijackingPrevention::new(true, true, 5);

    let session = manager.create_session("gina").unwrap();
    let fresh = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(!prevention.detect_session_fixation(&fresh));

    store
        .update(&session.session_id, &mut |session| {
            session.last_accessed = Utc::now() - Duration::seconds(400);
        })
        .unwrap();
    let aged = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(prevention.detect_session_fixation(&aged));

    // A touched session is never a fixation candidate.
    manager.touch_session(&session.session_id).unwrap();
    let touched = store.find_by_id(&session.session_id).unwrap().unwrap();
    assert!(!prevention.detect_session_fixation(&touched));
}

#[test]
fn session_ids_are_unique_and_url_safe() {
    let store = Arc::new(MemorySessionStore::new());
    let manager = SessionManager::from_config(store, &config_with_limit(2000));

    let mut seen = std::collections::HashSet::new();
    for _ in 0..1000 {
        let session = manager.create_session("henry").unwrap();
        assert!(session.session_id.len() > 20);
        assert!(!session.session_id.contains(['=', '+', '/']));
        assert!(seen.insert(session.session_id));
    }
}
