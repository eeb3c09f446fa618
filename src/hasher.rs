//! Password hashing with bcrypt.
//!
//! bcrypt embeds the salt and cost in its output and verification compares the
//! tag in constant time, so the verify path leaks nothing about where a
//! mismatch occurs.

use tracing::debug;

use crate::errors::{AuthError, Result};

/// Adaptive password hasher with a configurable work factor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost factor (4-31).
    pub fn new(cost: u32) -> Result<Self> {
        if !(4..=31).contains(&cost) {
            return Err(AuthError::config("bcrypt cost must be between 4 and 31"));
        }
        Ok(Self { cost })
    }

    /// The configured cost factor.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password. The salt is generated and embedded by bcrypt.
    pub fn hash(&self, password: &str) -> Result<String> {
        if password.is_empty() {
            return Err(AuthError::validation("password cannot be empty"));
        }
        let hash = bcrypt::hash(password, self.cost)
            .map_err(|e| AuthError::crypto(format!("password hashing failed: {e}")))?;
        debug!("password hashed with cost factor {}", self.cost);
        Ok(hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// A malformed hash verifies as `false` rather than erroring, so storage
    /// corruption cannot be distinguished from a wrong password by a caller.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        if password.is_empty() || hash.is_empty() {
            return false;
        }
        bcrypt::verify(password, hash).unwrap_or(false)
    }

    /// Whether a stored hash should be recomputed: the embedded cost differs
    /// from the configured cost, or the format is unrecognized.
    pub fn needs_rehash(&self, hash: &str) -> bool {
        match embedded_cost(hash) {
            Some(cost) => cost != self.cost,
            None => true,
        }
    }
}

/// Extract the cost factor from a bcrypt hash (`$2b$12$...` -> 12).
fn embedded_cost(hash: &str) -> Option<u32> {
    let mut parts = hash.split('$');
    if !parts.next()?.is_empty() {
        return None;
    }
    if !parts.next()?.starts_with('2') {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(4).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("Hunter2!-abcdef").unwrap();
        assert!(hash.starts_with("$2"));
        assert!(hasher.verify("Hunter2!-abcdef", &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn test_salt_is_embedded() {
        let hasher = hasher();
        let first = hasher.hash("Hunter2!-abcdef").unwrap();
        let second = hasher.hash("Hunter2!-abcdef").unwrap();
        assert_ne!(first, second);
        assert!(hasher.verify("Hunter2!-abcdef", &first));
        assert!(hasher.verify("Hunter2!-abcdef", &second));
    }

    #[test]
    fn test_empty_password_is_invalid_argument() {
        let hasher = hasher();
        assert!(matches!(
            hasher.hash(""),
            Err(AuthError::Validation { .. })
        ));
        assert!(!hasher.verify("", "$2b$04$whatever"));
    }

    #[test]
    fn test_malformed_hash_verifies_false() {
        let hasher = hasher();
        assert!(!hasher.verify("Hunter2!-abcdef", "not-a-bcrypt-hash"));
        assert!(!hasher.verify("Hunter2!-abcdef", ""));
    }

    #[test]
    fn test_needs_rehash_on_cost_drift() {
        let low = PasswordHasher::new(4).unwrap();
        let high = PasswordHasher::new(5).unwrap();
        let hash = low.hash("Hunter2!-abcdef").unwrap();
        assert!(!low.needs_rehash(&hash));
        assert!(high.needs_rehash(&hash));
        assert!(low.needs_rehash("garbage"));
    }

    #[test]
    fn test_cost_bounds() {
        assert!(PasswordHasher::new(3).is_err());
        assert!(PasswordHasher::new(32).is_err());
        assert!(PasswordHasher::new(4).is_ok());
        assert_eq!(PasswordHasher::default().cost(), bcrypt::DEFAULT_COST);
    }
}
