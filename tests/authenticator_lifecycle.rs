//! End-to-end tests for the authenticator lifecycle: creation, validation,
//! lockout, history, expiration, and renewal.

use std::sync::Arc;

use access_core::{
    AuthError, AuthenticatorError, AuthenticatorManager, AuthenticatorStatus, AuthenticatorType,
    Credential, ErrorCode, MemoryAuthenticationStorage, PasswordAuthenticationProvider,
    PasswordHasher, PasswordPolicy, AuthenticationProvider,
};

fn manager_with(policy: PasswordPolicy) -> Arc<AuthenticatorManager<MemoryAuthenticationStorage>> {
    Arc::new(
        AuthenticatorManager::new(
            Arc::new(MemoryAuthenticationStorage::new()),
            PasswordHasher::new(4).unwrap(),
            policy,
        )
        .unwrap(),
    )
}

fn lockout_policy() -> PasswordPolicy {
    PasswordPolicy {
        max_failed_attempts: 3,
        lockout_window_minutes: 15,
        lockout_duration_minutes: 15,
        ..PasswordPolicy::default()
    }
}

#[test]
fn create_then_validate() {
    let manager = manager_with(PasswordPolicy::default());
    let authenticator = manager
        .create("alice", &Credential::password("alice", "Hunter2!-abcdef"))
        .unwrap();
    assert_eq!(authenticator.status, AuthenticatorStatus::Active);
    assert_eq!(authenticator.kind(), AuthenticatorType::Password);

    assert!(manager
        .validate("alice", &Credential::password("alice", "Hunter2!-abcdef"))
        .unwrap());
    assert!(!manager
        .validate("alice", &Credential::password("alice", "wrong"))
        .unwrap());
}

#[test]
fn stored_material_is_a_hash_not_the_password() {
    let manager = manager_with(PasswordPolicy::default());
    let authenticator = manager
        .create("alice", &Credential::password("alice", "Hunter2!-abcdef"))
        .unwrap();
    let hash = authenticator.password_hash().unwrap();
    assert!(hash.starts_with("$2"));
    assert!(!hash.contains("Hunter2"));
}

#[test]
fn three_failures_lock_the_account() {
    let manager = manager_with(lockout_policy());
    manager
        .create("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap();

    for _ in 0..3 {
        assert!(!manager
            .validate("bob", &Credential::password("bob", "x"))
            .unwrap());
    }

    let authenticator = manager
        .get("bob", AuthenticatorType::Password)
        .unwrap()
        .unwrap();
    assert_eq!(authenticator.status, AuthenticatorStatus::Locked);
    assert!(authenticator.is_locked());
    assert!(authenticator.locked_until().is_some());
    assert_eq!(authenticator.failed_attempts(), 3);

    // Fourth attempt: still false, and the provider reports the lockout code.
    assert!(!manager
        .validate("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap());

    let provider = PasswordAuthenticationProvider::new(manager);
    let result = provider
        .authenticate(Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_code, Some(ErrorCode::AuthenticatorLocked));
}

#[test]
fn success_resets_the_attempt_counter() {
    let manager = manager_with(lockout_policy());
    manager
        .create("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap();

    // Two failures, then a success, then two more failures: never locked,
    // because the success resets the window.
    for _ in 0..2 {
        assert!(!manager
            .validate("bob", &Credential::password("bob", "x"))
            .unwrap());
    }
    assert!(manager
        .validate("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap());
    for _ in 0..2 {
        assert!(!manager
            .validate("bob", &Credential::password("bob", "x"))
            .unwrap());
    }

    let authenticator = manager
        .get("bob", AuthenticatorType::Password)
        .unwrap()
        .unwrap();
    assert_eq!(authenticator.status, AuthenticatorStatus::Active);
    assert!(manager
        .validate("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap());
}

#[test]
fn elapsed_lockout_recovers_on_read() {
    let policy = PasswordPolicy {
        lockout_duration_minutes: 0,
        ..lockout_policy()
    };
    let manager = manager_with(policy);
    manager
        .create("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap();

    for _ in 0..3 {
        let _ = manager
            .validate("bob", &Credential::password("bob", "x"))
            .unwrap();
    }

    // Zero-duration lockout elapses immediately; the next read normalizes the
    // status back to ACTIVE and the correct password works again.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let authenticator = manager
        .get("bob", AuthenticatorType::Password)
        .unwrap()
        .unwrap();
    assert_eq!(authenticator.status, AuthenticatorStatus::Active);
    assert!(authenticator.locked_until().is_none());
    assert!(manager
        .validate("bob", &Credential::password("bob", "Hunter2!-abcdef"))
        .unwrap());
}

#[test]
fn update_rejects_wrong_old_password() {
    let manager = manager_with(PasswordPolicy::default());
    manager
        .create("carol", &Credential::password("carol", "Hunter2!-abcdef"))
        .unwrap();

    let err = manager
        .update(
            "carol",
            &Credential::password("carol", "wrong-old"),
            &Credential::password("carol", "NewSecret9!-xyz"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Authenticator(AuthenticatorError::OldCredentialInvalid)
    ));
}

#[test]
fn history_window_blocks_recent_reuse_only() {
    let policy = PasswordPolicy {
        password_history_size: 2,
        ..PasswordPolicy::default()
    };
    let manager = manager_with(policy);

    let p1 = "FirstSecret1!-aa";
    let p2 = "SecondSecret2!-bb";
    let p3 = "ThirdSecret3!-cc";

    manager
        .create("dave", &Credential::password("dave", p1))
        .unwrap();
    manager
        .update(
            "dave",
            &Credential::password("dave", p1),
            &Credential::password("dave", p2),
        )
        .unwrap();
    manager
        .update(
            "dave",
            &Credential::password("dave", p2),
            &Credential::password("dave", p3),
        )
        .unwrap();

    // The retained window is now {p2, p3}: going back to p2 is rejected.
    let err = manager
        .update(
            "dave",
            &Credential::password("dave", p3),
            &Credential::password("dave", p2),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Authenticator(AuthenticatorError::RecentlyUsed)
    ));

    // p1 fell out of the window, so it is accepted again.
    manager
        .update(
            "dave",
            &Credential::password("dave", p3),
            &Credential::password("dave", p1),
        )
        .unwrap();
    assert!(manager
        .validate("dave", &Credential::password("dave", p1))
        .unwrap());
}

#[test]
fn update_rejects_policy_violations() {
    let manager = manager_with(PasswordPolicy::default());
    manager
        .create("erin", &Credential::password("erin", "Hunter2!-abcdef"))
        .unwrap();

    let err = manager
        .update(
            "erin",
            &Credential::password("erin", "Hunter2!-abcdef"),
            &Credential::password("erin", "weak"),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Authenticator(AuthenticatorError::PolicyViolation { .. })
    ));
}

#[test]
fn expire_then_renew() {
    let manager = manager_with(PasswordPolicy::default());
    manager
        .create("frank", &Credential::password("frank", "Hunter2!-abcdef"))
        .unwrap();

    manager
        .expire("frank", AuthenticatorType::Password)
        .unwrap();
    assert!(manager
        .is_expired("frank", AuthenticatorType::Password)
        .unwrap());
    assert!(!manager
        .validate("frank", &Credential::password("frank", "Hunter2!-abcdef"))
        .unwrap());

    let renewed = manager
        .renew(
            "frank",
            AuthenticatorType::Password,
            &Credential::password("frank", "NewSecret9!-xyz"),
        )
        .unwrap();
    assert_eq!(renewed.status, AuthenticatorStatus::Active);
    assert!(manager
        .validate("frank", &Credential::password("frank", "NewSecret9!-xyz"))
        .unwrap());
}

#[test]
fn provider_reports_specific_failure_codes() {
    let manager = manager_with(PasswordPolicy::default());
    let provider = PasswordAuthenticationProvider::new(manager.clone());

    // Unknown identifier.
    let result = provider
        .authenticate(Credential::password("ghost", "Hunter2!-abcdef"))
        .unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::AuthenticatorNotFound));

    // Revoked.
    manager
        .create("gina", &Credential::password("gina", "Hunter2!-abcdef"))
        .unwrap();
    manager.revoke("gina", AuthenticatorType::Password).unwrap();
    let result = provider
        .authenticate(Credential::password("gina", "Hunter2!-abcdef"))
        .unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::AuthenticatorRevoked));

    // Expired.
    manager
        .create("hugo", &Credential::password("hugo", "Hunter2!-abcdef"))
        .unwrap();
    manager.expire("hugo", AuthenticatorType::Password).unwrap();
    let result = provider
        .authenticate(Credential::password("hugo", "Hunter2!-abcdef"))
        .unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::AuthenticatorExpired));

    // Wrong password.
    manager
        .create("ivy", &Credential::password("ivy", "Hunter2!-abcdef"))
        .unwrap();
    let result = provider
        .authenticate(Credential::password("ivy", "wrong"))
        .unwrap();
    assert_eq!(result.error_code, Some(ErrorCode::InvalidPassword));

    // Correct password.
    let result = provider
        .authenticate(Credential::password("ivy", "Hunter2!-abcdef"))
        .unwrap();
    assert!(result.success);
    let principal = result.principal.unwrap();
    assert_eq!(principal.identifier, "ivy");
    assert_eq!(principal.authentication_type, "password");
}

#[test]
fn list_returns_all_families() {
    let manager = manager_with(PasswordPolicy::default());
    manager
        .create("judy", &Credential::password("judy", "Hunter2!-abcdef"))
        .unwrap();
    let listed = manager.list("judy").unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind(), AuthenticatorType::Password);
    assert!(manager.list("nobody").unwrap().is_empty());
}
