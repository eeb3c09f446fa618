/*!
# Access Core

The identity, authenticator, and session core of a NIST 800-53 aligned
access-management stack.

For each request the core answers three coupled questions: which authenticator
currently binds to an identifier and whether it is usable; whether a presented
credential matches that authenticator under the active policy; and whether the
resulting session is still live, bound to its origin, and free of pending
re-authentication demands.

## Features

- Authenticator lifecycle management (create, validate, update, revoke,
  expire, renew) with policy enforcement and password history
- Password hashing with bcrypt and constant-time verification
- Sliding-window failed-attempt tracking with automatic lockout and
  lockout-elapse recovery
- X.509 certificate validation with a pluggable trust store
- Multi-factor coordination across password and PKI providers
- Session lifecycle with concurrent-session limits, id regeneration,
  re-authentication reasons, and timeout evaluation
- Sealed (AES-256-GCM) storage for sensitive session attributes
- Session-hijacking prevention: origin binding, fixation and anomaly detection
- Thread-safe in-memory storage backends suitable for single-node authority

## Quick Start

```rust
use std::sync::Arc;

use access_core::{
    AuthConfig, AuthenticatorManager, Credential, MemoryAuthenticationStorage,
    MemorySessionStore, PasswordHasher, PasswordPolicy, SessionManager,
};

# fn main() -> access_core::Result<()> {
let config = AuthConfig::default();

// Authenticator side: create and validate a password.
let storage = Arc::new(MemoryAuthenticationStorage::new());
let manager = AuthenticatorManager::new(
    storage,
    PasswordHasher::default(),
    PasswordPolicy::from_config(&config),
)?;
manager.create("alice", &Credential::password("alice", "Hunter2!-abcdef"))?;
assert!(manager.validate("alice", &Credential::password("alice", "Hunter2!-abcdef"))?);

// Session side: create a session and apply lifecycle rules on access.
let sessions = SessionManager::from_config(Arc::new(MemorySessionStore::new()), &config);
let session = sessions.create_session("alice")?;
assert!(sessions.validate_session(&session.session_id)?);
# Ok(())
# }
```

## Security Considerations

- Raw passwords are held in zeroizing buffers and cleared by providers in the
  success-and-failure common path
- Session ids carry 256 bits of entropy and are URL-safe
- Password hashing runs outside storage locks; commits happen under per-key
  exclusivity
- Regenerate session ids on privilege changes to defeat fixation
*/

pub mod authenticator;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod hasher;
pub mod identity;
pub mod manager;
pub mod mfa;
pub mod pki;
pub mod policy;
pub mod principal;
pub mod providers;
pub mod security;
pub mod session;
pub mod storage;

pub use authenticator::{
    Authenticator, AuthenticatorMaterial, AuthenticatorStatus, AuthenticatorType,
};
pub use config::AuthConfig;
pub use credentials::{Credential, SecureString};
pub use errors::{AuthError, AuthenticatorError, ErrorCode, Result, SessionError, StorageError};
pub use hasher::PasswordHasher;
pub use identity::{EvidenceType, IdentityAssuranceLevel, IdentityProofing, ProofingResult};
pub use manager::AuthenticatorManager;
pub use mfa::{MfaPolicy, MultiFactorAuthenticator};
pub use pki::{Certificate, CertificateStore, CertificateValidationResult, CertificateValidator};
pub use policy::{PasswordPolicy, PasswordPolicyValidator, PolicyValidationResult};
pub use principal::Principal;
pub use providers::{
    AuthenticationProvider, AuthenticationResult, PasswordAuthenticationProvider,
    PkiAuthenticationProvider,
};
pub use security::{AttributeEncryption, SealedAttribute};
pub use session::{
    ConcurrentSessionManager, MemorySessionStore, ReauthReason, ReauthenticationPolicy,
    ReauthenticationTrigger, Session, SessionFactory, SessionHijackingPrevention,
    SessionIdGenerator, SessionManager, SessionState, SessionStore, SessionTimeoutManager,
    SessionValidator,
};
pub use storage::{AuthenticationStorage, MemoryAuthenticationStorage};
